use super::*;

#[tokio::test]
async fn test_add_task_runs_to_completion() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) = create_test_downloader(engine.clone()).await;

    let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    let task = downloader.add_task(url).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.url, url);
    assert!(task.id.as_str().starts_with("task-"));

    let done = wait_for_status(&downloader, &task.id, TaskStatus::Completed).await;
    assert_eq!(done.progress, 1.0);
    assert_eq!(done.percent, 100);
    assert_eq!(done.title, format!("Title of {url}"));
    assert_eq!(done.file_size, Some(MOCK_FILE_SIZE));
    assert!(done.finished_at.is_some());
    assert!(done.last_error.is_empty());

    let path = done.output_path.unwrap();
    assert!(path.is_absolute());
    assert!(path.ends_with("dQw4w9WgXcQ.mp4"));
    assert_eq!(engine.download_calls(), 1);
}

#[tokio::test]
async fn test_add_task_rejects_duplicate_url_while_not_finished() {
    let engine = MockEngine::new();
    let url = "https://youtu.be/aaaaaaaaaaa";
    engine.script(url, Script::Hold);
    let (downloader, _temp_dir) = create_test_downloader(engine.clone()).await;

    let first = downloader.add_task(url).await.unwrap();

    match downloader.add_task(url).await {
        Err(Error::Task(TaskError::Duplicate { url: dup, existing_id })) => {
            assert_eq!(dup, url);
            assert_eq!(existing_id, first.id.to_string());
        }
        other => panic!("expected duplicate error, got {other:?}"),
    }
    assert_eq!(downloader.get_all_tasks().await.len(), 1);

    engine.release(url);
    wait_for_status(&downloader, &first.id, TaskStatus::Completed).await;

    // Finished tasks no longer block the URL
    let second = downloader.add_task(url).await.unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn test_get_all_tasks_in_creation_order() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) = create_test_downloader(engine).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let task = downloader
            .add_task(format!("https://example.com/video/{i}"))
            .await
            .unwrap();
        ids.push(task.id);
    }

    let listed: Vec<TaskId> = downloader
        .get_all_tasks()
        .await
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_get_task_unknown_returns_none() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) = create_test_downloader(engine).await;

    assert!(downloader.get_task(&TaskId::from("task-missing")).await.is_none());
}

#[tokio::test]
async fn test_get_task_by_video_id() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) = create_test_downloader(engine).await;

    let youtube = downloader
        .add_task("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();
    let vimeo = downloader
        .add_task("https://vimeo.com/76979871")
        .await
        .unwrap();

    let found = downloader.get_task_by_video_id("dQw4w9WgXcQ").await.unwrap();
    assert_eq!(found.id, youtube.id);

    let found = downloader.get_task_by_video_id("vimeo_76979871").await.unwrap();
    assert_eq!(found.id, vimeo.id);

    assert!(downloader.get_task_by_video_id("zzzzzzzzzzz").await.is_none());
}

#[tokio::test]
async fn test_add_task_emits_pending_update_first() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) = create_test_downloader(engine).await;
    let mut events = downloader.subscribe();

    let task = downloader
        .add_task("https://example.com/video/events")
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        Event::TaskUpdated { task: snapshot } => {
            assert_eq!(snapshot.id, task.id);
            assert_eq!(snapshot.status, TaskStatus::Pending);
        }
        other => panic!("unexpected first event: {other:?}"),
    }
}
