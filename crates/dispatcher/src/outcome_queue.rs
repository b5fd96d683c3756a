use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use filestore_core::Job;

/// 结果队列中的预留位置，提交被接受时领取，路由结束后交回
#[derive(Debug)]
#[must_use = "预留的位置必须通过 OutcomeQueue::deliver 交回，否则后续结果会被阻塞"]
pub struct OutcomeTicket {
    sequence: u64,
}

impl OutcomeTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Default)]
struct OutcomeState {
    next_sequence: u64,
    next_release: u64,
    /// 已完成但前面还有未完成提交的结果
    parked: BTreeMap<u64, Job>,
    ready: VecDeque<Job>,
}

/// 客户端可见的结果队列
///
/// 结果按提交被接受的顺序释放，即使路由完成的顺序不同。
#[derive(Default)]
pub struct OutcomeQueue {
    state: Mutex<OutcomeState>,
    notify: Notify,
}

impl OutcomeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reserve(&self) -> OutcomeTicket {
        let mut state = self.state.lock().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        OutcomeTicket { sequence }
    }

    pub async fn deliver(&self, ticket: OutcomeTicket, job: Job) {
        let mut state = self.state.lock().await;
        state.parked.insert(ticket.sequence, job);

        let mut released = false;
        loop {
            let next = state.next_release;
            let Some(job) = state.parked.remove(&next) else {
                break;
            };
            state.ready.push_back(job);
            state.next_release += 1;
            released = true;
        }

        if released {
            self.notify.notify_waiters();
        }
    }

    /// 取出下一个结果，队列为空时最多等待 `timeout`
    pub async fn next(&self, timeout: Duration) -> Option<Job> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified;
            {
                let mut state = self.state.lock().await;
                if let Some(job) = state.ready.pop_front() {
                    return Some(job);
                }
                notified = self.notify.notified();
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// 可以立即取走的结果数量
    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// 已接受但结果尚未被释放的提交数量
    pub async fn in_flight(&self) -> u64 {
        let state = self.state.lock().await;
        state.next_sequence - state.next_release
    }
}
