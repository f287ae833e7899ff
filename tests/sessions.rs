mod common;

use std::time::Duration;

use common::{Lobby, chat_lines, joined_room, settle};
use raceparty_back::{
    dao::lobby_store::LobbyStore,
    dto::ws::{ClientIntent, ServerMessage},
    services::websocket_service::handle_intent,
    state::{identity::Identity, rooms::Outbound},
};

#[tokio::test(start_paused = true)]
async fn second_connection_replaces_first_and_third_is_denied() {
    let lobby = Lobby::new();
    let mut a = lobby.player("u1").await;
    let mut b = lobby.connect();
    let mut c = lobby.connect();

    let takeover = {
        let state = lobby.state.clone();
        let handle = b.handle.clone();
        tokio::spawn(async move {
            let intent = ClientIntent::from_json_str(r#"{"type":"identify","identity":"u1"}"#)
                .expect("valid intent");
            handle_intent(&state, &handle, intent).await;
        })
    };
    settle().await;

    assert_eq!(
        a.drain(),
        vec![
            Outbound::Event(ServerMessage::SessionReplaced),
            Outbound::Close
        ]
    );

    // B is still waiting for A to go away.
    c.identify("u1").await;
    assert_eq!(
        c.drain(),
        vec![
            Outbound::Event(ServerMessage::SessionDenied),
            Outbound::Close
        ]
    );
    assert!(lobby.state.sessions().is_revoked(c.handle.id));

    drop(a.rx);
    takeover.await.expect("identify task");

    let owner = lobby
        .state
        .sessions()
        .owner(&Identity::from("u1"))
        .expect("owned");
    assert_eq!(owner.id, b.handle.id);
    assert!(b.drain().is_empty());

    // The revoked connection can never come back.
    c.identify("u1").await;
    assert_eq!(lobby.state.sessions().owner(&Identity::from("u1")).unwrap().id, b.handle.id);
}

#[tokio::test(start_paused = true)]
async fn intents_require_an_identified_connection() {
    let lobby = Lobby::new();
    let mut anonymous = lobby.connect();

    anonymous.create_party("u1", "ada").await;
    assert_eq!(
        anonymous.events(),
        vec![ServerMessage::PartyError {
            message: "connection has not identified".into()
        }]
    );
    assert_eq!(lobby.store.party_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn profile_of_someone_else_is_rejected() {
    let lobby = Lobby::new();
    let mut ada = lobby.player("u1").await;

    ada.create_party("u2", "mallory").await;
    assert_eq!(
        ada.events(),
        vec![ServerMessage::PartyError {
            message: "Profile does not match the identified player".into()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn reconnecting_within_grace_keeps_the_seat() {
    let lobby = Lobby::new();
    lobby.register("u1", "ada", 1300);
    let mut leader = lobby.player("u1").await;
    leader.create_party("u1", "ada").await;
    let code = joined_room(&leader.events()).unwrap();
    let mut mate = lobby.player("guest_m").await;
    mate.join_private(&code, "guest_m", "mate").await;
    mate.events();

    leader.disconnect();
    tokio::time::sleep(Duration::from_secs(20)).await;

    let mut back = lobby.connect();
    back.identify("u1").await;
    let events = back.events();
    let Some(ServerMessage::JoinedParty {
        room_code,
        member_count,
        assigned_color,
        ..
    }) = events.first()
    else {
        panic!("expected a resync, got {events:?}");
    };
    assert_eq!(room_code, &code);
    assert_eq!(*member_count, 2);
    assert_eq!(assigned_color, "#ef4444");

    tokio::time::sleep(Duration::from_secs(40)).await;
    let party = lobby.store.find_party(code.clone()).await.unwrap().unwrap();
    assert_eq!(party.members.len(), 2);
    assert!(mate.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn grace_expiry_removes_the_player_and_tells_the_room() {
    let lobby = Lobby::new();
    lobby.register("u1", "ada", 1300);
    let mut leader = lobby.player("u1").await;
    leader.create_party("u1", "ada").await;
    let code = joined_room(&leader.events()).unwrap();
    let mut mate = lobby.player("guest_m").await;
    mate.join_private(&code, "guest_m", "mate").await;
    mate.events();
    assert_eq!(
        lobby.store.user("u1").unwrap().current_party.as_deref(),
        Some(code.as_str())
    );

    leader.disconnect();
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(
        lobby
            .store
            .find_party(code.clone())
            .await
            .unwrap()
            .unwrap()
            .members
            .len(),
        2
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    let party = lobby.store.find_party(code.clone()).await.unwrap().unwrap();
    assert_eq!(party.members.len(), 1);
    assert_eq!(party.members[0].id, "guest_m");
    assert_eq!(lobby.store.user("u1").unwrap().current_party, None);

    let events = mate.events();
    assert!(matches!(
        events[0],
        ServerMessage::PartyUpdate { member_count: 1, .. }
    ));
    assert_eq!(chat_lines(&events), ["ada disconnected."]);
}

#[tokio::test(start_paused = true)]
async fn explicit_leave_defuses_the_reaper() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();
    let mut mate = lobby.player("guest_m").await;
    mate.join_private(&code, "guest_m", "mate").await;
    mate.events();

    mate.leave(&code).await;
    assert_eq!(mate.events(), vec![ServerMessage::LeftParty]);
    assert_eq!(
        chat_lines(&host.events()),
        ["mate left."]
    );
    mate.disconnect();

    tokio::time::sleep(Duration::from_secs(31)).await;
    let party = lobby.store.find_party(code).await.unwrap().unwrap();
    assert_eq!(party.members.len(), 1);
    assert!(host.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn replaced_owner_closing_does_not_arm_the_reaper() {
    let lobby = Lobby::new();
    let mut first = lobby.player("guest_p").await;
    first.create_party("guest_p", "p").await;
    let code = joined_room(&first.events()).unwrap();

    let mut second = lobby.connect();
    let takeover = {
        let state = lobby.state.clone();
        let handle = second.handle.clone();
        tokio::spawn(async move {
            let intent =
                ClientIntent::from_json_str(r#"{"type":"identify","identity":"guest_p"}"#)
                    .expect("valid intent");
            handle_intent(&state, &handle, intent).await;
        })
    };
    settle().await;
    first.disconnect();
    takeover.await.expect("identify task");

    assert!(!lobby.state.removals().is_armed(&Identity::from("guest_p")));
    assert_eq!(joined_room(&second.events()), Some(code.clone()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    let party = lobby.store.find_party(code).await.unwrap().unwrap();
    assert_eq!(party.members.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn switching_identity_stops_listening_to_the_old_room() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();
    let mut mate = lobby.player("guest_m").await;
    mate.join_private(&code, "guest_m", "mate").await;
    mate.events();
    host.events();

    mate.identify("guest_z").await;
    mate.events();
    assert!(lobby.state.removals().is_armed(&Identity::from("guest_m")));

    host.send(&format!(
        r#"{{"type":"send_chat","room":"{code}","text":"still there?"}}"#
    ))
    .await;
    assert!(mate.events().is_empty());

    mate.send(&format!(
        r#"{{"type":"send_chat","room":"{code}","text":"ghost"}}"#
    ))
    .await;
    assert!(chat_lines(&host.events()).iter().all(|line| line != "ghost"));
}
