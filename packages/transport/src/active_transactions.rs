use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::transaction::TransactionId;
use krpc_protocol::Envelope;

/// Default deadline for an outstanding query: BEP-5 doesn't fix one, but
/// 15 seconds is long enough for a legitimate node to answer over UDP and
/// short enough that a Sybil pollinating thousands of contacts a minute
/// doesn't accumulate state indefinitely.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

struct Pending {
    deadline: Instant,
    responder: oneshot::Sender<Envelope>,
}

/// Tracks `{tid -> pending query}` for the lifetime of outstanding KRPC
/// transactions. Response sends (replying to a received query) never
/// touch this table; only query sends register here.
#[derive(Clone)]
pub struct ActiveTransactions {
    inner: std::sync::Arc<Mutex<HashMap<TransactionId, Pending>>>,
}

impl ActiveTransactions {
    pub fn new() -> ActiveTransactions {
        ActiveTransactions {
            inner: std::sync::Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a transaction with a deadline of `now + timeout`,
    /// returning the receiving half that resolves when a matching
    /// response arrives, or is dropped (and so errors) when `sweep`
    /// reaps it past its deadline.
    pub fn register(&self, tid: TransactionId, timeout: Duration) -> oneshot::Receiver<Envelope> {
        let (tx, rx) = oneshot::channel();
        let pending = Pending {
            deadline: Instant::now() + timeout,
            responder: tx,
        };
        self.inner.lock().unwrap().insert(tid, pending);
        rx
    }

    /// Fulfils a pending transaction with the matching response. Returns
    /// `true` if a transaction with this TID was outstanding, `false` if
    /// it had already been swept or never existed (an unsolicited or
    /// stale response, silently ignored by the caller).
    pub fn complete(&self, tid: TransactionId, envelope: Envelope) -> bool {
        let pending = self.inner.lock().unwrap().remove(&tid);
        match pending {
            Some(pending) => pending.responder.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Drops every transaction past its deadline. Dropping the sender
    /// half causes the corresponding receiver to resolve to an error the
    /// caller surfaces as `Error::Timeout`.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let expired: Vec<TransactionId> = inner
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(tid, _)| *tid)
            .collect();
        for tid in &expired {
            inner.remove(tid);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActiveTransactions {
    fn default() -> ActiveTransactions {
        ActiveTransactions::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krpc_protocol::{MessageType, Query};

    fn envelope(tid: u8) -> Envelope {
        Envelope {
            transaction_id: vec![0, tid],
            version: None,
            read_only: false,
            message_type: MessageType::Query {
                query: Query::Ping {
                    id: krpc_protocol::NodeID([0u8; 20]),
                },
            },
        }
    }

    #[test]
    fn complete_fulfils_a_registered_transaction() {
        let transactions = ActiveTransactions::new();
        let tid = TransactionId(1);
        let rx = transactions.register(tid, Duration::from_secs(15));

        assert!(transactions.complete(tid, envelope(1)));
        assert!(rx.try_recv().is_ok());
        assert_eq!(transactions.len(), 0);
    }

    #[test]
    fn complete_on_unknown_tid_is_a_noop() {
        let transactions = ActiveTransactions::new();
        assert!(!transactions.complete(TransactionId(99), envelope(99)));
    }

    #[test]
    fn sweep_drops_only_expired_transactions() {
        let transactions = ActiveTransactions::new();
        let now = Instant::now();
        transactions.register(TransactionId(1), Duration::from_secs(0));
        transactions.register(TransactionId(2), Duration::from_secs(60));

        let swept = transactions.sweep(now + Duration::from_millis(1));

        assert_eq!(swept, 1);
        assert_eq!(transactions.len(), 1);
    }
}
