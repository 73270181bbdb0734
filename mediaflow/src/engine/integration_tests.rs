//! End-to-end engine scenarios over in-memory collaborators.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::core::{ExecutionState, ExecutionStatus, StageOutcome, StageResult, WorkflowExecution};
    use crate::engine::{TriggerEvent, WorkflowEngine};
    use crate::errors::{ErrorClassification, MediaflowError};
    use crate::pipeline::{
        PipelineDefinition, RetryPolicy, StageDefinition, EXTRACT_TEXT_STAGE, TRANSCODE_STAGE,
        TRANSCRIBE_STAGE,
    };
    use crate::store::{ExecutionStore, JsonFileExecutionStore};
    use crate::testing::{
        assert_attempts, assert_failed_with, assert_stage_history_ordered,
        assert_succeeded_in_order, ScriptedAttempt, ScriptedJobAdapter, TestHarness, SAMPLE_TEXT,
    };

    fn trigger() -> TriggerEvent {
        TriggerEvent::new("lecture01", "raw/lecture01.mp4")
    }

    /// The default pipeline with a custom transcode stage.
    fn pipeline_with_transcode(transcode: StageDefinition) -> PipelineDefinition {
        let mut stages = PipelineDefinition::transcription().stages().to_vec();
        stages[0] = transcode;
        PipelineDefinition::new(stages).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pipeline_produces_text() {
        let harness = TestHarness::new().with_transcript("lecture01");
        let engine = harness.engine().unwrap();

        let id = engine.start(trigger()).await.unwrap();
        let exec = engine.run_to_completion(id).await.unwrap();

        assert_succeeded_in_order(&exec, engine.pipeline());
        assert_stage_history_ordered(&exec);
        assert_eq!(exec.output_of(TRANSCODE_STAGE), Some("media/lecture01.mp3"));
        assert_eq!(exec.output_of(TRANSCRIBE_STAGE), Some("transcripts/lecture01.srt"));
        assert_eq!(exec.output_of(EXTRACT_TEXT_STAGE), Some("text/lecture01.txt"));
        assert_eq!(
            harness.storage.get("text/lecture01.txt").as_deref(),
            Some(SAMPLE_TEXT)
        );

        let inputs = harness.transcriber.started_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].location, "media/lecture01.mp3");
        assert_eq!(harness.transcoder.started_inputs()[0].location, "raw/lecture01.mp4");

        let stored = harness.store.load(id).await.unwrap();
        assert_eq!(stored, exec);

        let notifications = harness.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, ExecutionStatus::Succeeded);
        assert_eq!(notifications[0].last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_twice_then_succeeds() {
        let harness = TestHarness::new()
            .with_transcript("lecture01")
            .with_transcoder(
                ScriptedJobAdapter::new("transcoder", "media", "mp3")
                    .then(ScriptedAttempt::fails_with("ThrottlingException", "Rate exceeded"))
                    .then(ScriptedAttempt::fails_with("ThrottlingException", "Rate exceeded")),
            );
        let engine = harness.engine().unwrap();
        let started = tokio::time::Instant::now();

        let id = engine.start(trigger()).await.unwrap();
        let exec = engine.run_to_completion(id).await.unwrap();

        assert_succeeded_in_order(&exec, engine.pipeline());
        assert_attempts(
            &exec,
            TRANSCODE_STAGE,
            &[
                StageOutcome::RetryableFailure,
                StageOutcome::RetryableFailure,
                StageOutcome::Success,
            ],
        );
        assert_stage_history_ordered(&exec);
        assert_eq!(harness.transcoder.start_calls(), 3);

        let first = &exec.stages()[0];
        let detail = first.error_detail.as_ref().unwrap();
        assert_eq!(detail.classification, ErrorClassification::TransientProviderError);
        assert_eq!(detail.provider_code.as_deref(), Some("ThrottlingException"));

        // Backoff of 2s then 4s between the three attempts.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_timecode_fails_extraction() {
        let harness = TestHarness::new();
        harness.storage.insert(
            "transcripts/lecture01.srt",
            "1\n99999999999999:00:00,000 --> 99999999999999:00:01,000\nHi.\n",
        );
        let engine = harness.engine().unwrap();

        let id = engine.start(trigger()).await.unwrap();
        let handle = engine.spawn(id);
        let exec = handle.await.unwrap().unwrap();

        assert_failed_with(&exec, EXTRACT_TEXT_STAGE, ErrorClassification::PermanentInputError);
        assert_attempts(&exec, EXTRACT_TEXT_STAGE, &[StageOutcome::FatalFailure]);
        let stored = harness.store.load(id).await.unwrap();
        assert_eq!(stored.status(), ExecutionStatus::Failed);
        assert!(stored.in_flight().is_none());
        assert_eq!(harness.notifier.notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_on_first_attempt() {
        let harness = TestHarness::new().with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3").then(
                ScriptedAttempt::fails_with("InvalidInput", "malformed container header"),
            ),
        );
        let pipeline = pipeline_with_transcode(
            StageDefinition::external_job(TRANSCODE_STAGE)
                .with_retry_policy(RetryPolicy::default().max_attempts(10))
                .with_output_extension("mp3"),
        );
        let engine = harness.engine_for(pipeline).unwrap();

        let id = engine.start(trigger()).await.unwrap();
        let exec = engine.run_to_completion(id).await.unwrap();

        assert_failed_with(&exec, TRANSCODE_STAGE, ErrorClassification::PermanentInputError);
        assert_attempts(&exec, TRANSCODE_STAGE, &[StageOutcome::FatalFailure]);
        assert_eq!(exec.stages().len(), 1);
        assert_eq!(harness.transcoder.start_calls(), 1);
        assert_eq!(harness.transcriber.start_calls(), 0);

        let notifications = harness.notifier.notifications();
        assert_eq!(notifications[0].status, ExecutionStatus::Failed);
        let message = notifications[0].last_error.clone().unwrap();
        assert!(message.contains("transcode"), "{message}");
        assert!(message.contains("attempt 1"), "{message}");
        assert!(message.contains("PermanentInputError"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_on_timeouts() {
        let harness = TestHarness::new().with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3")
                .then(ScriptedAttempt::NeverFinishes)
                .then(ScriptedAttempt::NeverFinishes),
        );
        let pipeline = pipeline_with_transcode(
            StageDefinition::external_job(TRANSCODE_STAGE)
                .with_timeout(Duration::from_secs(60))
                .with_retry_policy(RetryPolicy::default().max_attempts(2)),
        );
        let engine = harness.engine_for(pipeline).unwrap();

        let id = engine.start(trigger()).await.unwrap();
        let exec = engine.run_to_completion(id).await.unwrap();

        assert_failed_with(&exec, TRANSCODE_STAGE, ErrorClassification::Timeout);
        assert_attempts(
            &exec,
            TRANSCODE_STAGE,
            &[StageOutcome::RetryableFailure, StageOutcome::RetryableFailure],
        );
        assert_eq!(harness.transcoder.start_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_errors_are_recorded_as_attempts() {
        let harness = TestHarness::new().with_transcript("lecture01").with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3").then(ScriptedAttempt::StartError(
                crate::errors::ProviderError::new("ServiceUnavailable", "try again later"),
            )),
        );
        let engine = harness.engine().unwrap();

        let id = engine.start(trigger()).await.unwrap();
        let exec = engine.run_to_completion(id).await.unwrap();

        assert_succeeded_in_order(&exec, engine.pipeline());
        assert_attempts(
            &exec,
            TRANSCODE_STAGE,
            &[StageOutcome::RetryableFailure, StageOutcome::Success],
        );
        assert!(exec.stages()[0].provider_job_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_stops_polling() {
        let harness = TestHarness::new().with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3").then(ScriptedAttempt::NeverFinishes),
        );
        let engine = harness.engine().unwrap();
        let id = engine.start(trigger()).await.unwrap();

        let handle = engine.spawn(id);
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(matches!(
            engine.state(id).await.unwrap(),
            ExecutionState::WaitingOnStage { stage_index: 0, attempt: 1 }
        ));

        let polls_before = harness.transcoder.poll_calls();
        assert!(polls_before > 0);
        let snapshot = engine.cancel(id, "operator request").await.unwrap();
        assert_eq!(snapshot.status(), ExecutionStatus::Running);

        let exec = handle.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(exec.status(), ExecutionStatus::Cancelled);
        assert_eq!(exec.cancel_reason(), Some("operator request"));
        assert_eq!(harness.transcoder.poll_calls(), polls_before);
        // The attempt stays in flight: the provider job was not killed.
        assert_eq!(exec.stages().len(), 1);
        assert!(exec.stages()[0].is_in_flight());
        assert!(exec.stages()[0].provider_job_id.is_some());

        let notifications = harness.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, ExecutionStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_idle_execution_is_immediate() {
        let harness = TestHarness::new();
        let engine = harness.engine().unwrap();
        let id = engine.start(trigger()).await.unwrap();

        let exec = engine.cancel(id, "duplicate upload").await.unwrap();
        assert_eq!(exec.status(), ExecutionStatus::Cancelled);
        assert!(exec.stages().is_empty());
        assert_eq!(harness.store.load(id).await.unwrap().status(), ExecutionStatus::Cancelled);

        // Terminal executions are left alone.
        let again = engine.cancel(id, "second request").await.unwrap();
        assert_eq!(again.cancel_reason(), Some("duplicate upload"));
        let advanced = engine.advance(id).await.unwrap();
        assert_eq!(advanced, again);
        assert_eq!(harness.transcoder.start_calls(), 0);
        assert_eq!(harness.notifier.notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_backoff() {
        let harness = TestHarness::new().with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3")
                .then(ScriptedAttempt::fails_with("ThrottlingException", "Rate exceeded")),
        );
        let pipeline = pipeline_with_transcode(
            StageDefinition::external_job(TRANSCODE_STAGE)
                .with_retry_policy(RetryPolicy::with_base_delay(3, Duration::from_secs(600))),
        );
        let engine = harness.engine_for(pipeline).unwrap();
        let id = engine.start(trigger()).await.unwrap();

        let handle = engine.spawn(id);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(matches!(
            engine.state(id).await.unwrap(),
            ExecutionState::WaitingOnStage { attempt: 2, .. }
        ));

        engine.cancel(id, "stop").await.unwrap();
        let exec = handle.await.unwrap().unwrap();

        assert_eq!(exec.status(), ExecutionStatus::Cancelled);
        assert_eq!(harness.transcoder.start_calls(), 1);
        assert_attempts(&exec, TRANSCODE_STAGE, &[StageOutcome::RetryableFailure]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_steps_one_stage_at_a_time() {
        let harness = TestHarness::new().with_transcript("lecture01");
        let engine = harness.engine().unwrap();
        let id = engine.start(trigger()).await.unwrap();
        assert_eq!(engine.state(id).await.unwrap(), ExecutionState::Pending(0));

        let exec = engine.advance(id).await.unwrap();
        assert_eq!(exec.status(), ExecutionStatus::Running);
        assert_eq!(exec.current_stage_index(), 1);
        assert_eq!(engine.state(id).await.unwrap(), ExecutionState::Pending(1));

        engine.advance(id).await.unwrap();
        let exec = engine.advance(id).await.unwrap();
        assert_eq!(exec.status(), ExecutionStatus::Succeeded);
        assert_eq!(engine.state(id).await.unwrap(), ExecutionState::Succeeded);

        let unchanged = engine.advance(id).await.unwrap();
        assert_eq!(unchanged, exec);
        assert_eq!(harness.transcoder.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_polls_persisted_job_instead_of_restarting() {
        let harness = TestHarness::new().with_transcript("lecture01").with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3").with_existing_job(
                "transcoder-before-crash",
                ScriptedAttempt::succeeds_after(1, "media/lecture01.mp3"),
            ),
        );

        let mut crashed = WorkflowExecution::new("lecture01", "raw/lecture01.mp4");
        crashed
            .record(StageResult::in_flight(TRANSCODE_STAGE, 1).with_provider_job("transcoder-before-crash"))
            .unwrap();
        harness.store.save(&mut crashed).await.unwrap();
        let id = crashed.execution_id();

        let engine = harness.engine().unwrap();
        let handles = engine.resume_running().await.unwrap();
        assert_eq!(handles.len(), 1);
        let exec = tokio_test::assert_ok!(handles.into_iter().next().unwrap().await.unwrap());

        assert_succeeded_in_order(&exec, engine.pipeline());
        assert_eq!(harness.transcoder.start_calls(), 0);
        assert_eq!(harness.transcoder.poll_calls(), 2);
        assert_eq!(
            exec.stages()[0].provider_job_id.as_deref(),
            Some("transcoder-before-crash")
        );
        assert_eq!(exec.execution_id(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_from_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let harness = TestHarness::new().with_transcript("lecture01");
        let store = Arc::new(JsonFileExecutionStore::open(dir.path()).await.unwrap());

        // First process: persists the in-flight transcode attempt, then stops.
        let id = {
            let engine = WorkflowEngine::new(
                Arc::new(PipelineDefinition::transcription()),
                harness.executor(),
                Arc::clone(&store) as Arc<dyn ExecutionStore>,
            )
            .unwrap();
            let id = engine.start(trigger()).await.unwrap();
            let mut exec = engine.load(id).await.unwrap();
            exec.record(StageResult::in_flight(TRANSCODE_STAGE, 1).with_provider_job("transcoder-job-1"))
                .unwrap();
            store.save(&mut exec).await.unwrap();
            id
        };

        // Second process: a fresh store over the same directory.
        let transcoder = ScriptedJobAdapter::new("transcoder", "media", "mp3").with_existing_job(
            "transcoder-job-1",
            ScriptedAttempt::succeeds_after(0, "media/lecture01.mp3"),
        );
        let harness = TestHarness {
            transcoder: Arc::new(transcoder),
            ..harness
        };
        let reopened = Arc::new(JsonFileExecutionStore::open(dir.path()).await.unwrap());
        let engine = WorkflowEngine::new(
            Arc::new(PipelineDefinition::transcription()),
            harness.executor(),
            Arc::clone(&reopened) as Arc<dyn ExecutionStore>,
        )
        .unwrap();

        let results: Vec<_> = futures::future::join_all(engine.resume_running().await.unwrap()).await;
        assert_eq!(results.len(), 1);

        let exec = reopened.load(id).await.unwrap();
        assert_succeeded_in_order(&exec, engine.pipeline());
        assert_eq!(harness.transcoder.start_calls(), 0);
        assert!(reopened
            .list_by_status(ExecutionStatus::Running)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_all_is_independent_per_execution() {
        let harness = TestHarness::new()
            .with_transcript("lecture01")
            .with_transcript("lecture02")
            .with_transcoder(
                ScriptedJobAdapter::new("transcoder", "media", "mp3")
                    .then(ScriptedAttempt::succeeds_after(2, "media/lecture01.mp3"))
                    .then(ScriptedAttempt::fails_with("UnsupportedMediaFormat", "cannot decode")),
            );
        let engine = harness.engine().unwrap().with_max_concurrent_executions(1);

        let first = engine.start(trigger()).await.unwrap();
        let second = engine
            .start(TriggerEvent::new("lecture02", "raw/lecture02.mp4"))
            .await
            .unwrap();
        assert_ne!(first, second);

        // Scripts follow start order, which the scheduler decides.
        let results = engine.run_all([first, second]).await;
        let executions: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        let (succeeded, failed): (Vec<_>, Vec<_>) = executions
            .iter()
            .partition(|e| e.status() == ExecutionStatus::Succeeded);
        assert_eq!((succeeded.len(), failed.len()), (1, 1));

        assert_succeeded_in_order(succeeded[0], engine.pipeline());
        assert_failed_with(failed[0], TRANSCODE_STAGE, ErrorClassification::PermanentInputError);
        assert_eq!(failed[0].stages().len(), 1);
        assert_eq!(harness.notifier.notifications().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_triggers_create_separate_executions() {
        let harness = TestHarness::new().with_transcript("lecture01");
        let engine = harness.engine().unwrap();

        let a = engine.start(trigger()).await.unwrap();
        let b = engine.start(trigger()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(harness.store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_completion_rejects_second_owner() {
        let harness = TestHarness::new().with_transcoder(
            ScriptedJobAdapter::new("transcoder", "media", "mp3").then(ScriptedAttempt::NeverFinishes),
        );
        let engine = harness.engine().unwrap();
        let id = engine.start(trigger()).await.unwrap();

        let handle = engine.spawn(id);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let err = engine.run_to_completion(id).await.unwrap_err();
        assert!(matches!(err, MediaflowError::Busy(busy) if busy == id));

        // A concurrent advance returns the stored record without stepping.
        let snapshot = engine.advance(id).await.unwrap();
        assert_eq!(snapshot.stages().len(), 1);

        engine.cancel(id, "cleanup").await.unwrap();
        assert_eq!(
            handle.await.unwrap().unwrap().status(),
            ExecutionStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_unknown_execution() {
        let harness = TestHarness::new();
        let engine = harness.engine().unwrap();
        let id = crate::core::ExecutionId::new();

        assert!(matches!(
            engine.advance(id).await,
            Err(MediaflowError::UnknownExecution(missing)) if missing == id
        ));
        assert!(matches!(
            engine.cancel(id, "nope").await,
            Err(MediaflowError::UnknownExecution(_))
        ));
    }

    #[test]
    fn test_engine_requires_registered_work() {
        let harness = TestHarness::new();
        let err = WorkflowEngine::new(
            Arc::new(PipelineDefinition::transcription()),
            crate::executor::StageExecutor::new(),
            Arc::clone(&harness.store) as Arc<dyn ExecutionStore>,
        )
        .unwrap_err();
        assert_eq!(
            err,
            crate::errors::ConfigurationError::MissingAdapter(TRANSCODE_STAGE.to_string())
        );
    }
}
