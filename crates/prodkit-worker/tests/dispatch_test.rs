//! Deferred dispatch from a unit of work to the queue.

use prodkit_context::{CORRELATION_ID, LogContext, ScopedContext, TenantContext};
use prodkit_core::error::ErrorKind;
use prodkit_worker::{
    DeferredJobBuffer, EnqueueJob, JobTransport, Kwargs, MemoryQueue, enqueue_job,
    flush_enqueued_jobs,
};
use serde_json::json;

const QUEUE: &str = "prodkit:queue";

fn request_log() -> LogContext {
    LogContext::default().bind([(CORRELATION_ID, "req-1")])
}

#[tokio::test]
async fn test_send_email_jobs_share_request_context() {
    let queue = MemoryQueue::new();
    let buffer = DeferredJobBuffer::new(QUEUE);

    let ids = TenantContext::for_tenant("t1")
        .scope(request_log().scope(buffer.scope(async {
            let mut ids = Vec::new();
            for to in ["a@example.com", "b@example.com"] {
                let mut kwargs = Kwargs::new();
                kwargs.insert("to".into(), json!(to));
                ids.push(enqueue_job("send_email", Vec::new(), kwargs).unwrap());
            }
            ids
        })))
        .await;

    assert!(queue.dispatched().is_empty());
    assert_eq!(buffer.flush(&queue).await.unwrap(), 2);

    let dispatched = queue.dispatched();
    assert_eq!(dispatched.len(), 2);
    assert_eq!(
        dispatched.iter().map(|r| r.job_id.clone()).collect::<Vec<_>>(),
        ids
    );
    assert_ne!(ids[0], ids[1]);
    for request in &dispatched {
        assert_eq!(request.name, "send_email");
        assert_eq!(request.queue_name, QUEUE);
        assert_eq!(request.tenant_id(), Some("t1"));
        assert_eq!(request.request_correlation_id(), Some("req-1"));
    }
    assert_eq!(dispatched[0].kwargs["to"], "a@example.com");
    assert_eq!(dispatched[1].kwargs["to"], "b@example.com");
}

#[tokio::test]
async fn test_second_flush_sends_nothing() {
    let queue = MemoryQueue::new();
    let buffer = DeferredJobBuffer::new(QUEUE);

    buffer
        .scope(async {
            EnqueueJob::new("a").enqueue().unwrap();
            assert_eq!(flush_enqueued_jobs(&queue).await.unwrap(), 1);
            assert_eq!(flush_enqueued_jobs(&queue).await.unwrap(), 0);
        })
        .await;

    assert_eq!(buffer.flush(&queue).await.unwrap(), 0);
    assert_eq!(queue.dispatched().len(), 1);
}

#[tokio::test]
async fn test_flush_outside_a_unit_of_work_is_a_no_op() {
    let queue = MemoryQueue::new();
    assert_eq!(flush_enqueued_jobs(&queue).await.unwrap(), 0);

    let err = EnqueueJob::new("a").enqueue().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
}

#[tokio::test]
async fn test_discarded_buffer_never_reaches_the_queue() {
    let queue = MemoryQueue::new();
    let buffer = DeferredJobBuffer::new(QUEUE);

    let failed: Result<(), &str> = buffer
        .scope(async {
            EnqueueJob::new("a").enqueue().unwrap();
            EnqueueJob::new("b").enqueue().unwrap();
            Err("handler failed")
        })
        .await;

    assert!(failed.is_err());
    assert_eq!(buffer.discard(), 2);
    assert_eq!(buffer.flush(&queue).await.unwrap(), 0);
    assert!(queue.dispatched().is_empty());
}

#[tokio::test]
async fn test_partial_dispatch_reports_progress() {
    let queue = MemoryQueue::new();
    queue.fail_after(2);
    let buffer = DeferredJobBuffer::new(QUEUE);

    TenantContext::for_tenant("t9")
        .scope(buffer.scope(async {
            for name in ["a", "b", "c", "d"] {
                EnqueueJob::new(name).enqueue().unwrap();
            }
        }))
        .await;

    let err = buffer.flush(&queue).await.unwrap_err();
    assert_eq!(err.dispatched, 2);
    assert_eq!(err.total, 4);
    assert_eq!(err.lost(), 2);
    assert_eq!(err.job_name, "c");
    assert_eq!(err.tenant_id.as_deref(), Some("t9"));
    assert_eq!(err.source.kind, ErrorKind::Queue);

    let names: Vec<_> = queue.dispatched().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_duplicate_job_ids_count_as_dispatched() {
    let queue = MemoryQueue::new();
    let buffer = DeferredJobBuffer::new(QUEUE);

    buffer
        .scope(async {
            EnqueueJob::new("report").job_id("report:2024-01").enqueue().unwrap();
            EnqueueJob::new("report").job_id("report:2024-01").enqueue().unwrap();
            EnqueueJob::new("report").queue("reports").enqueue().unwrap();
        })
        .await;

    assert_eq!(buffer.flush(&queue).await.unwrap(), 3);
    assert_eq!(queue.dispatched().len(), 2);
    assert_eq!(queue.queued(QUEUE), 1);
    assert_eq!(queue.queued("reports"), 1);
}

#[tokio::test]
async fn test_nested_units_of_work_have_separate_buffers() {
    let queue = MemoryQueue::new();
    let outer = DeferredJobBuffer::new(QUEUE);
    let inner = DeferredJobBuffer::new(QUEUE);

    outer
        .scope(async {
            EnqueueJob::new("outer").enqueue().unwrap();
            inner
                .scope(async {
                    EnqueueJob::new("inner").enqueue().unwrap();
                })
                .await;
            EnqueueJob::new("outer-again").enqueue().unwrap();
        })
        .await;

    assert_eq!(outer.len(), 2);
    assert_eq!(inner.len(), 1);

    inner.flush(&queue).await.unwrap();
    outer.flush(&queue).await.unwrap();
    let names: Vec<_> = queue.dispatched().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["inner", "outer", "outer-again"]);
}

#[tokio::test]
async fn test_transport_enqueue_is_idempotent_on_job_id() {
    let queue = MemoryQueue::new();
    let request = EnqueueJob::new("a").job_id("fixed").build(QUEUE).unwrap();

    assert!(queue.enqueue(&request).await.unwrap().is_some());
    assert!(queue.enqueue(&request).await.unwrap().is_none());
}
