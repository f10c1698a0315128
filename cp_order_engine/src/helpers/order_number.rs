//! Human-readable order numbers.
//!
//! Order numbers look like `CP-20241019-7QX2MD`: a fixed prefix, the UTC creation date, and six random uppercase
//! alphanumeric characters. They are what customers quote to support staff, so ambiguous lookalikes are not a concern
//! of the generator; uniqueness is enforced by the database.
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db_types::OrderId;

pub const ORDER_NUMBER_PREFIX: &str = "CP";
const SUFFIX_LEN: usize = 6;
const CHARSET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W',
    'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub fn new_order_number(now: DateTime<Utc>) -> OrderId {
    let mut rng = rand::thread_rng();
    let suffix = (0..SUFFIX_LEN).map(|_| CHARSET[rng.gen_range(0..CHARSET.len())]).collect::<String>();
    OrderId(format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d")))
}

pub fn is_valid_order_number(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    prefix == ORDER_NUMBER_PREFIX &&
        date.len() == 8 &&
        date.chars().all(|c| c.is_ascii_digit()) &&
        suffix.len() == SUFFIX_LEN &&
        suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
