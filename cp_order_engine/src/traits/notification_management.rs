use crate::{
    db_types::{NewNotification, Notification},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, StorageError>;

    /// Newest first.
    async fn fetch_notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StorageError>;

    async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StorageError>;

    /// Only notifications that belong to `user_id` can be marked. Anyone else's id is reported as not found.
    async fn mark_notification_read(&self, user_id: &str, id: i64) -> Result<Notification, StorageError>;

    /// Returns the number of notifications that changed.
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, StorageError>;
}
