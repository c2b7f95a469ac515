use quickdraw::{
    UpdateMessage,
    config::{GameConfig, Pacing, RoundLimit},
    game::{IncomingMessage, JoinRequest, ResponseSubmission, StartRequest},
    mode::Submission,
    runtime::{self, Outbound},
};
use tokio::sync::mpsc::UnboundedReceiver;
use web_time::Duration;

fn fast_config() -> GameConfig {
    GameConfig {
        pacing: Pacing {
            prompt_interval: Duration::ZERO,
            response_window: Duration::from_millis(100),
        },
        default_round_limit: RoundLimit(1),
    }
}

async fn next_matching<P>(receiver: &mut UnboundedReceiver<Outbound>, predicate: P) -> UpdateMessage
where
    P: Fn(&UpdateMessage) -> bool,
{
    let wait = async {
        loop {
            match receiver.recv().await {
                Some(Outbound::Message(message)) if predicate(&message) => return message,
                Some(_) => {}
                None => panic!("outbound channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(120), wait)
        .await
        .expect("no matching event")
}

fn join(identity: &str) -> IncomingMessage {
    IncomingMessage::Join(JoinRequest {
        identity: Some(identity.to_string()),
    })
}

#[tokio::test(start_paused = true)]
async fn test_single_round_then_auto_stop() {
    let (handle, task) = runtime::spawn(fast_config());

    let (operator, mut operator_rx) = handle.connect();
    handle.send(operator, IncomingMessage::OperatorJoin);
    let (player, mut player_rx) = handle.connect();
    handle.send(player, join("alice"));
    handle.send(
        operator,
        IncomingMessage::StartGame(StartRequest {
            round_limit: Some(1),
        }),
    );

    let prompt = next_matching(&mut player_rx, |m| matches!(m, UpdateMessage::Prompt { .. })).await;
    let UpdateMessage::Prompt {
        round_index,
        round_limit,
        ..
    } = prompt
    else {
        unreachable!()
    };
    assert_eq!((round_index, round_limit), (1, 1));

    handle.send(
        player,
        IncomingMessage::SubmitResponse(ResponseSubmission {
            identity: Some("alice".to_string()),
            value: Some(Submission::Text("Scissors".to_string())),
            elapsed_ms: Some(50.),
            confidence: Some(1.0),
        }),
    );

    let UpdateMessage::Results { results } =
        next_matching(&mut player_rx, |m| matches!(m, UpdateMessage::Results { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identity, "alice");
    assert!((results[0].round_score - 85.0).abs() < 1e-9);

    next_matching(&mut operator_rx, |m| {
        matches!(m, UpdateMessage::OperatorNotice(notice) if notice.message == "Game 'rps' has been stopped.")
    })
    .await;

    handle.shutdown();
    task.await.unwrap();

    while let Ok(outbound) = player_rx.try_recv() {
        assert!(!matches!(
            outbound,
            Outbound::Message(UpdateMessage::Prompt { .. })
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn test_reset_closes_participant_channels() {
    let (handle, task) = runtime::spawn(fast_config());

    let (operator, mut operator_rx) = handle.connect();
    handle.send(operator, IncomingMessage::OperatorJoin);
    let (player, mut player_rx) = handle.connect();
    handle.send(player, join("bob"));
    handle.send(operator, IncomingMessage::ResetGame);

    next_matching(&mut player_rx, |m| *m == UpdateMessage::GameReset {}).await;
    assert_eq!(player_rx.recv().await, Some(Outbound::Close));

    next_matching(&mut operator_rx, |m| {
        *m == UpdateMessage::ScoreTable { scores: vec![] }
    })
    .await;

    handle.disconnect(player);
    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_command_is_answered() {
    let (handle, task) = runtime::spawn(fast_config());

    let (player, mut player_rx) = handle.connect();
    handle.send(player, IncomingMessage::StopGame);

    let message = next_matching(&mut player_rx, |m| matches!(m, UpdateMessage::Error { .. })).await;
    assert_eq!(
        message,
        UpdateMessage::Error {
            message: "Unauthorized action.".to_string()
        }
    );

    drop(handle);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_with_running_game_exits() {
    let (handle, task) = runtime::spawn(GameConfig::default());

    let (operator, _operator_rx) = handle.connect();
    handle.send(operator, IncomingMessage::OperatorJoin);
    handle.send(
        operator,
        IncomingMessage::StartGame(StartRequest { round_limit: None }),
    );
    handle.shutdown();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("game loop did not exit")
        .unwrap();
}
