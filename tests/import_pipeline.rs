mod common;

use common::{ScriptedEnricher, harness, quench, test_config, word_with};
use dictking_core::PipelineError;
use dictking_core::common::model::{ImportTask, StoredWordData, TaskStatus, WordData};
use dictking_core::persistence::{TaskStore, WordStore};

#[tokio::test]
async fn quench_is_enriched_and_imported() {
    let enricher = ScriptedEnricher::gated();
    enricher.answer("quench", quench());
    let h = harness(enricher, test_config());

    let created = h.orchestrator.create("quench").await.unwrap();
    assert_eq!(created.status, TaskStatus::Querying);
    assert!(!created.retried);

    // 查询还被卡着，任务停在 querying
    let pending = h.orchestrator.get_detail(&created.task_id).await.unwrap();
    assert_eq!(pending.status, TaskStatus::Querying);
    assert!(pending.word_data.is_none());

    h.enricher.open_gate();
    h.orchestrator.wait_idle().await;

    let ready = h.orchestrator.get_detail(&created.task_id).await.unwrap();
    assert_eq!(ready.status, TaskStatus::Ready);
    let Some(StoredWordData::Structured(data)) = &ready.word_data else {
        panic!("expected structured word_data, got {:?}", ready.word_data);
    };
    assert_eq!(data.word, "quench");
    assert!(data.created_at.is_some(), "created_at should be stamped");

    let imported = h
        .orchestrator
        .import(&created.task_id, "defaults")
        .await
        .unwrap();
    assert_eq!(imported.status, TaskStatus::Imported);
    assert_eq!(imported.imported_dict_id.as_deref(), Some("defaults"));
    assert!(imported.imported_at.is_some());
    assert!(imported.updated_at >= ready.updated_at);

    let record = h.memory.load_word("defaults", "quench").await.unwrap().unwrap();
    assert_eq!(record.brief, "扑灭");
    assert_eq!(
        h.catalog.word_detail("defaults", "quench").await.unwrap().word,
        "quench"
    );

    let metrics = h.orchestrator.metrics_snapshot();
    assert_eq!(metrics.enqueued, 1);
    assert_eq!(metrics.ready, 1);
    assert_eq!(metrics.imported, 1);
    assert_eq!(metrics.in_flight, 0);
}

#[tokio::test]
async fn empty_definitions_fail_then_create_rearms_same_task() {
    let enricher = ScriptedEnricher::new();
    enricher.answer("quench", word_with("quench", &[]));
    let h = harness(enricher, test_config());

    let first = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.wait_idle().await;

    let failed = h.orchestrator.get_detail(&first.task_id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    let message = failed.error_message.clone().unwrap();
    assert!(!message.is_empty());
    assert!(message.contains("no definitions"), "message was {message}");
    assert!(failed.word_data.is_none());

    h.enricher.answer("quench", quench());
    let second = h.orchestrator.create("quench").await.unwrap();
    assert_eq!(second.task_id, first.task_id);
    assert_eq!(second.status, TaskStatus::Querying);
    assert!(second.retried);

    h.orchestrator.wait_idle().await;
    let ready = h.orchestrator.get_detail(&first.task_id).await.unwrap();
    assert_eq!(ready.status, TaskStatus::Ready);
    assert!(ready.error_message.is_none());
    assert_eq!(h.orchestrator.metrics_snapshot().retried, 1);
}

#[tokio::test]
async fn second_create_is_duplicate_for_every_blocking_status() {
    let enricher = ScriptedEnricher::gated();
    enricher.answer("quench", quench());
    let h = harness(enricher, test_config());

    let created = h.orchestrator.create("quench").await.unwrap();
    let err = h.orchestrator.create("quench").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DuplicateTask { ref task_id, status: TaskStatus::Querying } if *task_id == created.task_id
    ));
    assert!(!err.is_retryable());

    h.enricher.open_gate();
    h.orchestrator.wait_idle().await;
    let err = h.orchestrator.create("quench").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DuplicateTask { status: TaskStatus::Ready, .. }
    ));

    h.orchestrator.import(&created.task_id, "defaults").await.unwrap();
    let err = h.orchestrator.create("  quench ").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DuplicateTask { status: TaskStatus::Imported, .. }
    ));

    // 只有一次查询
    assert_eq!(h.enricher.calls(), 1);
}

#[tokio::test]
async fn import_requires_ready() {
    let enricher = ScriptedEnricher::gated();
    enricher.answer("quench", quench());
    enricher.fail("dispel", "boom");
    let h = harness(enricher, test_config());

    let querying = h.orchestrator.create("quench").await.unwrap();
    let err = h
        .orchestrator
        .import(&querying.task_id, "defaults")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidState { status: TaskStatus::Querying, .. }
    ));

    let failing = h.orchestrator.create("dispel").await.unwrap();
    h.enricher.open_gate();
    h.orchestrator.wait_idle().await;

    let err = h
        .orchestrator
        .import(&failing.task_id, "defaults")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidState { status: TaskStatus::Failed, .. }
    ));

    h.orchestrator
        .import(&querying.task_id, "defaults")
        .await
        .unwrap();
    let err = h
        .orchestrator
        .import(&querying.task_id, "defaults")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidState { status: TaskStatus::Imported, .. }
    ));

    let err = h.orchestrator.import("missing", "defaults").await.unwrap_err();
    assert!(matches!(err, PipelineError::TaskNotFound(_)));
}

#[tokio::test]
async fn serialized_payload_reads_back_and_imports() {
    let h = harness(ScriptedEnricher::new(), test_config());

    let data = word_with("dispel", &["驱散", "", "消除", "打消", "排遣"]);
    let mut task = ImportTask::new("t-1".into(), "dispel");
    task.mark_ready(data.clone()).unwrap();
    task.word_data = Some(StoredWordData::serialized(&data).unwrap());
    h.memory.save(&task).await.unwrap();

    let detail = h.orchestrator.get_detail("t-1").await.unwrap();
    assert_eq!(detail.word_data, Some(StoredWordData::Structured(data)));

    h.orchestrator.import("t-1", "defaults").await.unwrap();
    let record = h.memory.load_word("defaults", "dispel").await.unwrap().unwrap();
    // 前三条里跳过空的
    assert_eq!(record.brief, "驱散；消除");
}

#[tokio::test]
async fn unparseable_payload_is_incomplete() {
    let h = harness(ScriptedEnricher::new(), test_config());

    let mut task = ImportTask::new("t-1".into(), "dispel");
    task.mark_ready(word_with("dispel", &["驱散"])).unwrap();
    task.word_data = Some(StoredWordData::Serialized("{not json".into()));
    h.memory.save(&task).await.unwrap();

    let err = h.orchestrator.import("t-1", "defaults").await.unwrap_err();
    assert!(matches!(err, PipelineError::IncompletePayload(_)));
    assert_eq!(h.memory.count_words("defaults").await.unwrap(), 0);
}

#[tokio::test]
async fn reimport_overwrites_word() {
    let enricher = ScriptedEnricher::new();
    enricher.answer("quench", quench());
    let h = harness(enricher, test_config());

    let first = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.wait_idle().await;
    h.orchestrator.import(&first.task_id, "defaults").await.unwrap();

    // 删掉任务后重新导入同一个单词
    h.orchestrator.delete(&first.task_id).await.unwrap();
    h.enricher
        .answer("quench", word_with("quench", &["解渴", "淬火"]));
    let second = h.orchestrator.create("quench").await.unwrap();
    assert_ne!(second.task_id, first.task_id);
    h.orchestrator.wait_idle().await;
    h.orchestrator.import(&second.task_id, "defaults").await.unwrap();

    assert_eq!(h.memory.count_words("defaults").await.unwrap(), 1);
    let record = h.memory.load_word("defaults", "quench").await.unwrap().unwrap();
    assert_eq!(record.brief, "解渴；淬火");
}

#[tokio::test]
async fn batch_create_reports_three_buckets() {
    let enricher = ScriptedEnricher::new();
    for word in ["quench", "dispel", "yelp"] {
        enricher.answer(word, word_with(word, &["x"]));
    }
    let h = harness(enricher, test_config());

    let existing = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.wait_idle().await;

    let report = h
        .orchestrator
        .batch_create(["quench", "dispel", "", "yelp", "dispel"])
        .await;

    let created: Vec<_> = report.created.iter().map(|c| c.word.as_str()).collect();
    assert_eq!(created, vec!["dispel", "yelp"]);

    let existing_words: Vec<_> = report.existing.iter().map(|e| e.word.as_str()).collect();
    assert_eq!(existing_words, vec!["quench", "dispel"]);
    assert_eq!(report.existing[0].task_id, existing.task_id);
    assert_eq!(report.existing[0].status, TaskStatus::Ready);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].word, "");

    h.orchestrator.wait_idle().await;
}

#[tokio::test]
async fn stats_and_list_cover_every_status() {
    let enricher = ScriptedEnricher::new();
    enricher.answer("quench", quench());
    enricher.answer("dispel", word_with("dispel", &["驱散"]));
    enricher.fail("yelp", "HTTP 500");
    let h = harness(enricher, test_config());

    let quench_task = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.create("dispel").await.unwrap();
    h.orchestrator.create("yelp").await.unwrap();
    h.orchestrator.wait_idle().await;
    h.orchestrator
        .import(&quench_task.task_id, "defaults")
        .await
        .unwrap();

    let stats = h.orchestrator.stats().await.unwrap();
    assert_eq!(stats.imported, 1);
    assert_eq!(stats.ready, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.querying, 0);
    assert_eq!(stats.total(), 3);

    let all = h.orchestrator.list(None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|t| t.word_data.is_none()));

    let failed = h.orchestrator.list(Some(TaskStatus::Failed)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].word, "yelp");
    assert!(failed[0].error_message.as_deref().unwrap().contains("HTTP 500"));
}

#[tokio::test]
async fn stats_count_every_stored_task() {
    let h = harness(ScriptedEnricher::new(), test_config());
    for i in 0..1005 {
        h.memory.create(&format!("w{i}")).await.unwrap();
    }

    let stats = h.orchestrator.stats().await.unwrap();
    assert_eq!(stats.querying, 1005);
    assert_eq!(stats.total(), 1005);
}

#[tokio::test]
async fn delete_while_in_flight_discards_result() {
    let enricher = ScriptedEnricher::gated();
    enricher.answer("quench", quench());
    let h = harness(enricher, test_config());

    let created = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.delete(&created.task_id).await.unwrap();
    assert_eq!(h.orchestrator.in_flight(), 1);

    h.enricher.open_gate();
    h.orchestrator.wait_idle().await;

    assert!(h.memory.load(&created.task_id).await.unwrap().is_none());
    assert_eq!(h.orchestrator.in_flight(), 0);
    assert_eq!(h.orchestrator.metrics_snapshot().ready, 0);

    // 删除不存在的任务也成功
    h.orchestrator.delete(&created.task_id).await.unwrap();
}

#[tokio::test]
async fn enricher_panic_becomes_failed_task() {
    let enricher = ScriptedEnricher::new();
    enricher.panic_on("quench");
    let h = harness(enricher, test_config());

    let created = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.wait_idle().await;

    let task = h.orchestrator.get_detail(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.unwrap().starts_with("Panic:"));
}

#[tokio::test]
async fn missing_word_field_is_failure() {
    let enricher = ScriptedEnricher::new();
    enricher.answer("quench", WordData::default());
    let h = harness(enricher, test_config());

    let created = h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.wait_idle().await;

    let task = h.orchestrator.get_detail(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error_message.unwrap().contains("missing word"));
}

#[tokio::test]
async fn empty_word_is_rejected_synchronously() {
    let h = harness(ScriptedEnricher::new(), test_config());
    let err = h.orchestrator.create("   ").await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyWord));
    assert_eq!(h.enricher.calls(), 0);
}

#[tokio::test]
async fn build_without_enricher_is_config_error() {
    let result = dictking_core::TaskOrchestrator::builder().build();
    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let enricher = ScriptedEnricher::gated();
    let mut config = test_config();
    config.orchestrator.max_concurrency = 2;
    let h = harness(enricher, config);

    for word in ["a", "b", "c", "d"] {
        h.enricher.answer(word, word_with(word, &["x"]));
        h.orchestrator.create(word).await.unwrap();
    }
    // 等后台任务都跑到闸门前
    assert!(common::eventually(|| h.enricher.calls() >= 2).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.enricher.calls(), 2);
    assert_eq!(h.orchestrator.in_flight(), 4);

    h.enricher.open_gate();
    h.orchestrator.wait_idle().await;
    assert_eq!(h.enricher.calls(), 4);
    assert_eq!(h.orchestrator.stats().await.unwrap().ready, 4);
}

#[tokio::test]
async fn concurrent_wait_idle_callers_all_return() {
    let enricher = ScriptedEnricher::gated();
    enricher.answer("quench", quench());
    enricher.answer("dispel", word_with("dispel", &["驱散"]));
    let h = harness(enricher, test_config());

    h.orchestrator.create("quench").await.unwrap();
    h.orchestrator.create("dispel").await.unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.wait_idle().await })
        })
        .collect();
    tokio::task::yield_now().await;
    h.enricher.open_gate();

    for waiter in waiters {
        tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
            .await
            .expect("wait_idle should return")
            .unwrap();
    }
    assert_eq!(h.orchestrator.in_flight(), 0);
}
