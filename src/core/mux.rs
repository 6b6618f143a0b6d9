//! # Ordered Multiplexer Module / 有序多路复用模块
//!
//! Concatenates per-task event streams strictly in resolution order,
//! regardless of completion order. Only the current task's channel is
//! pulled; later tasks' events stay buffered (and their producers
//! eventually suspend on the bounded channel) until every earlier task is
//! exhausted. Because the merge engine consumes nothing but this single
//! ordered stream, it is the sole writer of the run state without any
//! locking.
//!
//! 严格按解析顺序串接每任务事件流，而与完成顺序无关。只拉取当前任务的
//! 通道；后续任务的事件保持缓冲（其生产者最终在有界通道上挂起），直到
//! 之前的每个任务都耗尽。由于合并引擎只消费这一个有序流，它无需任何
//! 锁即是运行状态的唯一写入者。

use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::execution::{TaskSource, TaskStream};
use crate::core::models::TaskMeta;
use crate::core::tap::TapEvent;

/// Event source for the task currently at the head of the order.
enum ActiveSource {
    Child(ReceiverStream<TapEvent>),
    Missing(Option<String>),
}

struct ActiveTask {
    meta: TaskMeta,
    source: ActiveSource,
}

impl From<TaskStream> for ActiveTask {
    fn from(stream: TaskStream) -> Self {
        let source = match stream.source {
            TaskSource::Child(rx) => ActiveSource::Child(ReceiverStream::new(rx)),
            TaskSource::Missing(reason) => ActiveSource::Missing(reason),
        };
        Self {
            meta: stream.meta,
            source,
        }
    }
}

/// An index-addressed sequence of per-task channels, drained one task at a
/// time.
pub struct OrderedMux {
    pending: std::vec::IntoIter<TaskStream>,
    current: Option<ActiveTask>,
}

impl OrderedMux {
    pub fn new(streams: Vec<TaskStream>) -> Self {
        Self {
            pending: streams.into_iter(),
            current: None,
        }
    }

    /// The next event in global order, tagged with its task's metadata.
    /// Returns `None` once every task's stream is exhausted. Dropping the
    /// multiplexer mid-run drops all remaining channels, ending their
    /// producers.
    pub async fn next_event(&mut self) -> Option<(&TaskMeta, TapEvent)> {
        loop {
            if self.current.is_none() {
                self.current = Some(ActiveTask::from(self.pending.next()?));
            }

            let event = {
                let current = self.current.as_mut().expect("current task set above");
                match &mut current.source {
                    ActiveSource::Missing(reason) => {
                        reason.take().map(|reason| TapEvent::Missing { reason })
                    }
                    ActiveSource::Child(rx) => rx.next().await,
                }
            };

            match event {
                Some(event) => {
                    let meta = &self.current.as_ref().expect("current task set above").meta;
                    return Some((meta, event));
                }
                None => self.current = None,
            }
        }
    }
}
