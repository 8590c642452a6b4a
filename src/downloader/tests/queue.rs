use super::*;

#[tokio::test]
async fn test_third_task_waits_for_free_slot() {
    let engine = MockEngine::new();
    let urls = [
        "https://example.com/video/a",
        "https://example.com/video/b",
        "https://example.com/video/c",
    ];
    for url in urls {
        engine.script(url, Script::Hold);
    }
    let (downloader, _temp_dir) =
        create_test_downloader_with(engine.clone(), |c| c.download.max_parallel_downloads = 2)
            .await;

    let a = downloader.add_task(urls[0]).await.unwrap();
    let b = downloader.add_task(urls[1]).await.unwrap();
    let c = downloader.add_task(urls[2]).await.unwrap();

    wait_for_active(&engine, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        downloader.get_task(&c.id).await.unwrap().status,
        TaskStatus::Pending
    );
    assert_eq!(engine.download_calls(), 2);

    engine.release(urls[0]);
    wait_for_status(&downloader, &a.id, TaskStatus::Completed).await;
    wait_for_status(&downloader, &c.id, TaskStatus::Downloading).await;
    assert_ne!(
        downloader.get_task(&b.id).await.unwrap().status,
        TaskStatus::Pending
    );

    engine.release(urls[1]);
    engine.release(urls[2]);
    wait_for_status(&downloader, &b.id, TaskStatus::Completed).await;
    wait_for_status(&downloader, &c.id, TaskStatus::Completed).await;
    assert!(engine.max_active.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_active_downloads_never_exceed_bound() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) =
        create_test_downloader_with(engine.clone(), |c| c.download.max_parallel_downloads = 3)
            .await;

    let mut ids = Vec::new();
    for i in 0..10 {
        let url = format!("https://example.com/video/bound-{i}");
        engine.script(
            &url,
            Script::Succeed {
                samples: vec![(0, Some(MOCK_FILE_SIZE)), (MOCK_FILE_SIZE, Some(MOCK_FILE_SIZE))],
                step: Duration::from_millis(15),
            },
        );
        ids.push(downloader.add_task(url).await.unwrap().id);
    }

    for id in &ids {
        wait_for_status(&downloader, id, TaskStatus::Completed).await;
    }

    assert_eq!(engine.download_calls(), 10);
    let max_active = engine.max_active.load(Ordering::SeqCst);
    assert!(max_active <= 3, "saw {max_active} concurrent downloads");
    assert_eq!(downloader.active_count().await, 0);
}

#[tokio::test]
async fn test_raising_bound_admits_waiting_tasks() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) =
        create_test_downloader_with(engine.clone(), |c| c.download.max_parallel_downloads = 1)
            .await;

    let urls: Vec<String> = (0..3)
        .map(|i| format!("https://example.com/video/raise-{i}"))
        .collect();
    for url in &urls {
        engine.script(url, Script::Hold);
        downloader.add_task(url.as_str()).await.unwrap();
    }
    wait_for_active(&engine, 1).await;

    assert_eq!(downloader.set_max_parallel_downloads(3).await, 3);
    wait_for_active(&engine, 3).await;

    for url in &urls {
        engine.release(url);
    }
    wait_for_active(&engine, 0).await;
}

#[tokio::test]
async fn test_lowering_bound_does_not_evict_running_tasks() {
    let engine = MockEngine::new();
    let (downloader, _temp_dir) =
        create_test_downloader_with(engine.clone(), |c| c.download.max_parallel_downloads = 3)
            .await;

    let mut tasks = Vec::new();
    for i in 0..4 {
        let url = format!("https://example.com/video/lower-{i}");
        engine.script(&url, Script::Hold);
        tasks.push((url.clone(), downloader.add_task(url).await.unwrap()));
    }
    wait_for_active(&engine, 3).await;

    downloader.set_max_parallel_downloads(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.active(), 3);
    assert_eq!(downloader.active_count().await, 3);

    // Releasing one running task leaves two above the new bound: nothing is admitted
    engine.release(&tasks[0].0);
    wait_for_status(&downloader, &tasks[0].1.id, TaskStatus::Completed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        downloader.get_task(&tasks[3].1.id).await.unwrap().status,
        TaskStatus::Pending
    );

    for (url, _) in &tasks {
        engine.release(url);
    }
    for (_, task) in &tasks {
        wait_for_status(&downloader, &task.id, TaskStatus::Completed).await;
    }
}
