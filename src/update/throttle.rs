/*
 * Copyright 2025 Michael Krolikowski
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep_until, timeout},
};

/// Spaces out consecutive requests to one external service and bounds how
/// long each of them may take.
pub struct Throttle {
    delay: Duration,
    timeout: Duration,
    next: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration, timeout: Duration) -> Throttle {
        Throttle {
            delay,
            timeout,
            next: Mutex::new(None),
        }
    }

    /// Waits until `delay` has passed since the previous caller was let
    /// through. Callers queue up behind the lock.
    pub async fn wait(&self) {
        let mut next = self.next.lock().await;
        if let Some(at) = *next {
            sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.delay);
    }

    /// Runs `request` once it is its turn, failing it after `timeout`.
    pub async fn request<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.wait().await;
        timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow!("Timed out after {:?}", self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn first_request_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(2), TIMEOUT);
        let start = Instant::now();
        throttle.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let throttle = Throttle::new(Duration::from_secs(2), TIMEOUT);
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_delay_is_not_waited_again() {
        let throttle = Throttle::new(Duration::from_secs(2), TIMEOUT);
        throttle.wait().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        throttle.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_spaced_and_bounded() {
        let throttle = Throttle::new(Duration::from_secs(2), Duration::from_secs(10));
        let start = Instant::now();
        let first = throttle.request(async { Ok(1) }).await.unwrap();
        let second = throttle.request(async { Ok(2) }).await.unwrap();
        assert_eq!((first, second), (1, 2));
        assert!(start.elapsed() >= Duration::from_secs(2));

        let slow = throttle.request(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(3)
        });
        assert!(slow.await.is_err());
    }
}
