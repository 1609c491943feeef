//! Order number generation.
//!
//! An order number is `<unix millis><merchant id><6 digit code>`, e.g.
//! `1718000000000` + `42` + `031337`. The timestamp is 13 digits and the code always 6, so the
//! merchant id can be read back out of the middle.
//!
//! The code starts at a random offset and then counts up per generator, so numbers handed out
//! by one process never repeat within a millisecond (up to a million per ms). Two processes can
//! still collide; the unique index on `orders.order_no` is what actually rejects duplicates.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use rand::Rng;

const CODE_SPACE: u32 = 1_000_000;

#[derive(Debug)]
pub struct OrderNoGenerator {
    counter: AtomicU32,
}

impl OrderNoGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(rand::thread_rng().gen_range(0..CODE_SPACE)),
        }
    }

    pub fn generate(&self, merchant_id: i64) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let code = self.counter.fetch_add(1, Ordering::Relaxed) % CODE_SPACE;
        format!("{timestamp}{merchant_id}{code:06}")
    }
}

impl Default for OrderNoGenerator {
    fn default() -> Self {
        Self::new()
    }
}
