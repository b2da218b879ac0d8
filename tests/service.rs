use std::{sync::Arc, time::Duration};

use tileburg::{
    catalog::{BuildingKind, Catalog},
    config::{GameConfig, Profile},
    interaction::Command,
    placement::DeletionError,
    service::{spawn_day_timer, SimEvent, SimHandle},
    session::{CommandOutcome, Session},
};

fn session_in(dir: &std::path::Path) -> Session {
    let mut config = GameConfig::for_profile(Profile::Mobile);
    config.save.dir = dir.to_path_buf();
    Session::new_game(config, Arc::new(Catalog::standard())).unwrap()
}

#[tokio::test]
async fn commands_are_answered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let session = session_in(dir.path());
    let hall = session.world().town_hall().unwrap();
    let (handle, actor) = SimHandle::spawn(session);
    let mut events = handle.subscribe();

    let summary = handle.advance_day().await.unwrap();
    assert_eq!(summary.day, 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        SimEvent::DayAdvanced { day: 1, .. }
    ));

    let outcome = handle.delete_building(hall).await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::DeletionRejected {
            pos: hall,
            error: DeletionError::TownHallProtected
        }
    );

    handle
        .set_selected_object(Some(BuildingKind::Farm))
        .await
        .unwrap();
    handle.apply(Command::HoverTile(Some(hall))).await.unwrap();
    handle.select_tile(hall).await.unwrap();
    let status = handle.status().await.unwrap();
    assert_eq!(status.day, 1);
    assert_eq!(status.selection.selected_object, Some(BuildingKind::Farm));
    assert_eq!(status.selection.hovered_tile, Some(hall));
    assert_eq!(status.selection.selected_tile, Some(hall));

    let path = handle.save().await.unwrap();
    assert!(path.exists());
    assert!(matches!(events.recv().await.unwrap(), SimEvent::Saved(_)));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.day, 1);

    handle.shutdown().await.unwrap();
    let session = actor.await.unwrap();
    assert_eq!(session.world().day(), 1);
    assert!(session.world().grid().get(hall).unwrap().is_glowing);
    assert!(handle.advance_day().await.is_err());
}

#[tokio::test]
async fn day_timer_keeps_advancing() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, actor) = SimHandle::spawn(session_in(dir.path()));
    let mut events = handle.subscribe();
    let timer = spawn_day_timer(handle.clone(), Duration::from_millis(5));

    let mut last_day = 0;
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while last_day < 3 {
            if let Ok(SimEvent::DayAdvanced { day, .. }) = events.recv().await {
                last_day = day;
            }
        }
    })
    .await;
    assert!(waited.is_ok());

    timer.abort();
    handle.shutdown().await.unwrap();
    let session = actor.await.unwrap();
    assert!(session.world().day() >= 3);
}
