//! Single-flight request coalescing: concurrent callers for the same key
//! collapse into one upstream call and share its result.
//!
//! Grounded on the same keyed-mutex-plus-broadcast shape as a tower
//! request-coalescing layer, without the `tower::Service` plumbing: the
//! orchestrator calls plain async closures directly. A leader that is
//! dropped before completing (cancelled) leaves no result behind; any
//! waiter's next poll simply re-contends for leadership instead of
//! failing the whole group.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::sync::broadcast;
use txreplay_core::Error;

type FollowerResult<V> = Result<V, (txreplay_core::Code, String)>;

pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, broadcast::Sender<FollowerResult<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` for `key`, or waits for the in-flight leader's result if
    /// one is already running.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        loop {
            let joined = {
                let mut guard = self.inflight.lock();
                match guard.get(&key) {
                    Some(sender) => Some(sender.subscribe()),
                    None => {
                        let (tx, _rx) = broadcast::channel(1);
                        guard.insert(key.clone(), tx);
                        None
                    }
                }
            };

            match joined {
                Some(mut receiver) => match receiver.recv().await {
                    Ok(Ok(value)) => return Ok(value),
                    Ok(Err((code, message))) => return Err(Error::from_code(code, message)),
                    Err(_) => continue,
                },
                None => {
                    let result = work().await;
                    let mut guard = self.inflight.lock();
                    if let Some(sender) = guard.remove(&key) {
                        let broadcastable = match &result {
                            Ok(value) => Ok(value.clone()),
                            Err(error) => Err((error.code(), error.message().to_string())),
                        };
                        let _ = sender.send(broadcastable);
                    }
                    return result;
                }
            }
        }
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_upstream_call() {
        let sf: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sf = Arc::clone(&sf);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                sf.run("k".to_string(), || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, Error>(42)
                    }
                })
                .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let sf: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let sf = Arc::clone(&sf);
            let calls = Arc::clone(&calls);
            sf.run("a".to_string(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>(1)
                }
            })
        };
        let b = {
            let sf = Arc::clone(&sf);
            let calls = Arc::clone(&calls);
            sf.run("b".to_string(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>(2)
                }
            })
        };
        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn followers_observe_the_leader_error() {
        let sf: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());

        let leader = {
            let sf = Arc::clone(&sf);
            tokio::spawn(async move {
                sf.run("k".to_string(), || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(Error::timeout("slow upstream"))
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let follower = {
            let sf = Arc::clone(&sf);
            tokio::spawn(async move {
                sf.run("k".to_string(), || async { Ok::<_, Error>(0) }).await
            })
        };

        let leader_result = leader.await.unwrap();
        let follower_result = follower.await.unwrap();
        assert!(leader_result.unwrap_err().is(txreplay_core::RPC_TIMEOUT));
        assert!(follower_result.unwrap_err().is(txreplay_core::RPC_TIMEOUT));
    }

    #[tokio::test]
    async fn a_later_call_after_completion_runs_again() {
        let sf: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls2 = Arc::clone(&calls);
            sf.run("k".to_string(), || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(7)
            })
            .await
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
