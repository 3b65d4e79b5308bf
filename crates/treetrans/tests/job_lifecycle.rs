mod common;

use std::fs::File;

use common::{text_files, TestHarness, WAIT};
use treetrans::jobs::CANCELLED_MESSAGE;
use treetrans::{JobError, JobRequest, JobSource, JobStatus, UploadedFile};
use zip::ZipArchive;

#[tokio::test]
async fn test_upload_job_completes_with_archive() {
    let harness = TestHarness::new();
    let mut files = text_files(&[
        ("project/readme.md", "hello"),
        ("project/docs/guide.txt", "guide"),
        ("project/config.json", "{}"),
    ]);
    files.push(UploadedFile::new("project/logo.png", vec![0x89, b'P', b'N', b'G', 0, 1, 2]));
    files.push(UploadedFile::new("project/node_modules/dep/readme.md", "skip me"));

    let job = harness
        .service
        .submit(harness.upload_request("local", files))
        .await
        .unwrap();
    assert_eq!(job.model, "local-default");
    assert_eq!(job.allowed_extensions, vec![".md", ".txt", ".rst", ".adoc"]);

    let done = harness.wait_for_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.last_error);
    assert_eq!(done.progress.total_files, 4);
    assert_eq!(done.progress.processed_files, 4);
    assert_eq!(done.progress.failed_files, 0);
    assert!(done.progress.current_file.is_none());
    assert!(done.errors.is_empty());

    let out = harness.output_dir("result");
    assert_eq!(
        std::fs::read_to_string(out.join("project/readme.md")).unwrap(),
        "[German] hello"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("project/docs/guide.txt")).unwrap(),
        "[German] guide"
    );
    assert_eq!(std::fs::read_to_string(out.join("project/config.json")).unwrap(), "{}");
    assert_eq!(
        std::fs::read(out.join("project/logo.png")).unwrap(),
        vec![0x89, b'P', b'N', b'G', 0, 1, 2]
    );
    assert!(!out.join("project/node_modules").exists());

    let archive = harness.service.archive_for_download(&job.id).await.unwrap();
    assert_eq!(archive.file_name, format!("{}-translated.zip", job.id));
    let zip = ZipArchive::new(File::open(&archive.path).unwrap()).unwrap();
    let mut names: Vec<&str> = zip.file_names().collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "project/config.json",
            "project/docs/guide.txt",
            "project/logo.png",
            "project/readme.md"
        ]
    );

    let listed = harness.service.list_output_files(&job.id).await.unwrap();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0].path, "project/config.json");
    assert_eq!(listed[0].size, 2);

    let content = harness
        .service
        .read_output_file(&job.id, "project\\readme.md")
        .await
        .unwrap();
    assert_eq!(content.relative_path, "project/readme.md");
    assert_eq!(content.bytes, b"[German] hello");
    assert!(content.content_type.starts_with("text/"));
}

#[tokio::test]
async fn test_invalid_submissions_create_no_record() {
    let harness = TestHarness::new();

    let unknown = harness.upload_request("babelfish", text_files(&[("a.md", "x")]));
    let err = harness.service.submit(unknown).await.unwrap_err();
    assert!(err.is_user_input());
    assert!(err.to_string().contains("Unsupported translator provider"));

    let empty = harness.upload_request("local", vec![]);
    assert!(harness.service.submit(empty).await.unwrap_err().is_user_input());

    let traversal = harness.upload_request("local", text_files(&[("../escape.md", "x")]));
    assert!(harness.service.submit(traversal).await.unwrap_err().is_user_input());

    let bad_extension = JobRequest {
        allowed_extensions: vec!["md/../x".to_string()],
        ..harness.upload_request("local", text_files(&[("a.md", "x")]))
    };
    assert!(harness.service.submit(bad_extension).await.unwrap_err().is_user_input());

    let bad_repo = JobRequest {
        source: JobSource::Repository {
            url: "https://gitlab.com/owner/repo".to_string(),
        },
        ..harness.upload_request("local", vec![])
    };
    assert!(harness.service.submit(bad_repo).await.unwrap_err().is_user_input());

    let openai = harness.upload_request("openai", text_files(&[("a.md", "x")]));
    let err = harness.service.submit(openai).await.unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));

    assert!(harness.service.list().is_empty());
}

#[tokio::test]
async fn test_cancel_running_job() {
    let harness = TestHarness::new();
    let job = harness
        .service
        .submit(harness.upload_request("gated", text_files(&[("a.md", "a"), ("b.md", "b")])))
        .await
        .unwrap();

    tokio::time::timeout(WAIT, harness.gate.notified())
        .await
        .expect("translation never started");
    assert_eq!(harness.service.get(&job.id).unwrap().status, JobStatus::Running);

    let cancelled = harness.service.cancel(&job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert_eq!(cancelled.last_error.as_deref(), Some(CANCELLED_MESSAGE));

    harness.wait_until_idle().await;
    let settled = harness.service.get(&job.id).unwrap();
    assert_eq!(settled.status, JobStatus::Cancelled);
    assert_eq!(settled.last_error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!settled.archive_path.exists());

    assert!(matches!(
        harness.service.archive_for_download(&job.id).await,
        Err(JobError::NotCompleted)
    ));
}

#[tokio::test]
async fn test_cancel_queued_job_never_runs() {
    let harness = TestHarness::with_job_limit(Some(1));

    let first = harness
        .service
        .submit(harness.upload_request("gated", text_files(&[("a.md", "a")])))
        .await
        .unwrap();
    tokio::time::timeout(WAIT, harness.gate.notified())
        .await
        .expect("first job never started");

    let second = harness
        .service
        .submit(harness.upload_request("local", text_files(&[("b.md", "b")])))
        .await
        .unwrap();
    assert_eq!(harness.service.get(&second.id).unwrap().status, JobStatus::Queued);

    let cancelled = harness.service.cancel(&second.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    harness.service.cancel(&first.id).unwrap();
    harness.wait_until_idle().await;

    let second = harness.service.get(&second.id).unwrap();
    assert_eq!(second.status, JobStatus::Cancelled);
    assert_eq!(second.progress.total_files, 0);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let harness = TestHarness::new();
    let job = harness
        .service
        .submit(harness.upload_request("local", text_files(&[("a.md", "a")])))
        .await
        .unwrap();
    let done = harness.wait_for_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    let after = harness.service.cancel(&job.id).unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.updated_at, done.updated_at);

    assert!(matches!(
        harness.service.cancel("no-such-job"),
        Err(JobError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_all_files_failed_blocks_download() {
    let harness = TestHarness::new();
    let job = harness
        .service
        .submit(harness.upload_request("failing", text_files(&[("a.md", "alpha"), ("b.txt", "beta")])))
        .await
        .unwrap();

    let done = harness.wait_for_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.all_files_failed());
    assert_eq!(done.errors.len(), 2);
    assert_eq!(done.errors[0].relative_path, "a.md");
    assert_eq!(done.errors[0].message, "provider unavailable");

    // Failed files are still copied through.
    let out = harness.output_dir("result");
    assert_eq!(std::fs::read_to_string(out.join("a.md")).unwrap(), "alpha");

    assert!(matches!(
        harness.service.archive_for_download(&job.id).await,
        Err(JobError::AllFilesFailed)
    ));
    assert_eq!(harness.service.list_output_files(&job.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_panicking_provider_fails_the_job() {
    let harness = TestHarness::new();
    let job = harness
        .service
        .submit(harness.upload_request("panicking", text_files(&[("a.md", "alpha")])))
        .await
        .unwrap();

    let done = harness.wait_for_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    let message = done.last_error.unwrap();
    assert!(message.contains("panicked"), "{message}");
    assert!(message.contains("provider bug"), "{message}");

    harness.wait_until_idle().await;
    assert_eq!(harness.service.active_jobs(), 0);
}

#[tokio::test]
async fn test_read_output_file_rejects_escapes() {
    let harness = TestHarness::new();
    let job = harness
        .service
        .submit(harness.upload_request("local", text_files(&[("a.md", "a")])))
        .await
        .unwrap();
    harness.wait_for_terminal(&job.id).await;

    for path in ["../jobs/secret", "/etc/passwd", "", "a.md/../../x"] {
        let err = harness.service.read_output_file(&job.id, path).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidInput(_)), "{path}: {err}");
    }

    let missing = harness.service.read_output_file(&job.id, "nope.md").await.unwrap_err();
    assert!(matches!(missing, JobError::Io { .. }));
    assert!(!missing.to_string().contains(&*harness.output_dir("").display().to_string()));
}

#[tokio::test]
async fn test_progress_is_streamed() {
    let harness = TestHarness::new();
    let mut events = harness.service.subscribe();
    let job = harness
        .service
        .submit(harness.upload_request("local", text_files(&[("a.md", "a"), ("b.md", "b"), ("c.md", "c")])))
        .await
        .unwrap();
    harness.wait_for_terminal(&job.id).await;

    let mut processed = Vec::new();
    while let Ok(record) = events.try_recv() {
        if record.id == job.id && record.status == JobStatus::Running {
            processed.push(record.progress.processed_files);
        }
    }
    assert!(processed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(processed.last(), Some(&3));
}
