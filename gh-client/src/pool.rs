use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::GhClient;
use crate::errors::Result;

/// Fixed-size set of independent rate-limited clients, checked out one at a
/// time. Only used when `max_workers > 1` — a single-threaded caller has no
/// use for more than one client and should talk to `GhClient` directly.
///
/// Idle clients live in the mutex-guarded `idle` stack; `acquire` blocks on
/// the `notify` signal rather than polling, and `release` pushes the client
/// back and wakes one waiter. The mutex (not a semaphore-plus-index scheme)
/// is what actually guarantees no client is ever checked out twice at once.
pub struct ClientPool {
    idle: Mutex<Vec<Arc<GhClient>>>,
    notify: tokio::sync::Notify,
    size: usize,
}

pub struct Lease<'a> {
    pub client: Arc<GhClient>,
    pool: &'a ClientPool,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let client = self.client.clone();
        let pool = self.pool;
        // `idle` only ever briefly holds its lock to push/pop, so a
        // best-effort spawned release never stalls the dropping task.
        tokio::spawn(async move {
            pool.idle.lock().await.push(client);
            pool.notify.notify_one();
        });
    }
}

impl ClientPool {
    pub fn new(base_url: &str, token: &str, size: usize) -> Result<Self> {
        let size = size.max(1);
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(Arc::new(GhClient::new(base_url, token)?));
        }
        Ok(Self {
            idle: Mutex::new(idle),
            notify: tokio::sync::Notify::new(),
            size,
        })
    }

    /// Waits (asynchronously) until a client is idle, then checks it out —
    /// no client is ever lent out twice concurrently.
    pub async fn acquire(&self) -> Lease<'_> {
        loop {
            {
                let mut idle = self.idle.lock().await;
                if let Some(client) = idle.pop() {
                    return Lease { client, pool: self };
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_acquires_never_hand_out_the_same_client() {
        let pool = Arc::new(ClientPool::new("https://github.example.com", "token", 2).unwrap());
        let collisions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let pool = pool.clone();
            let collisions = collisions.clone();
            handles.push(tokio::spawn(async move {
                let lease_a = pool.acquire().await;
                let lease_b = pool.acquire().await;
                if Arc::ptr_eq(&lease_a.client, &lease_b.client) {
                    collisions.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(collisions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn released_client_becomes_available_again() {
        let pool = ClientPool::new("https://github.example.com", "token", 1).unwrap();
        {
            let _lease = pool.acquire().await;
        }
        tokio::time::timeout(std::time::Duration::from_secs(1), pool.acquire())
            .await
            .expect("released client should be reacquirable");
    }
}
