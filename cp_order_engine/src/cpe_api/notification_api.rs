use std::fmt::Debug;

use log::*;

use crate::{cpe_api::errors::NotificationApiError, db_types::Notification, traits::NotificationManagement};

/// Read access to a user's notifications and their read state.
pub struct NotificationApi<B> {
    db: B,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B>
where B: NotificationManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationApiError> {
        let result = self.db.fetch_notifications_for_user(user_id, unread_only).await?;
        Ok(result)
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<i64, NotificationApiError> {
        let result = self.db.count_unread_notifications(user_id).await?;
        Ok(result)
    }

    /// Marks one of the user's notifications as read. Other users' notifications are reported as not found.
    pub async fn mark_read(&self, user_id: &str, id: i64) -> Result<Notification, NotificationApiError> {
        let notification = self.db.mark_notification_read(user_id, id).await?;
        trace!("📬️ Notification #{id} marked read by {user_id}");
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, NotificationApiError> {
        let count = self.db.mark_all_notifications_read(user_id).await?;
        debug!("📬️ {count} notifications marked read for {user_id}");
        Ok(count)
    }
}
