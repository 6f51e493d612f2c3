use std::fmt;
use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Proactive spacing of outbound requests, shared by every fetch of one
/// gateway.
///
/// The pacer never reacts to responses: a `RateLimited` answer still reaches
/// the caller unchanged.
pub struct RequestPacer {
    bucket: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_second: NonZeroU32,
}

impl RequestPacer {
    /// A bucket admitting `requests_per_second`; zero is treated as one.
    pub fn per_second(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            bucket: RateLimiter::direct(Quota::per_second(per_second)),
            per_second,
        }
    }

    /// Resolve once the next request may go out.
    pub async fn pace(&self) {
        self.bucket.until_ready().await;
    }

    #[must_use]
    pub fn rate(&self) -> u32 {
        self.per_second.get()
    }
}

impl fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestPacer({}/s)", self.per_second)
    }
}
