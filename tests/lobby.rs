mod common;

use std::time::Duration;

use common::{Lobby, chat_lines, joined_room, settle};
use raceparty_back::{
    config::AppConfig,
    dao::lobby_store::LobbyStore,
    dto::ws::{ChatKind, ServerMessage},
    state::identity::Identity,
};

#[tokio::test(start_paused = true)]
async fn an_identity_sits_in_at_most_one_party() {
    let lobby = Lobby::new();
    let mut ada = lobby.player("u1").await;

    ada.create_party("u1", "ada").await;
    let private = joined_room(&ada.events()).expect("joined private party");

    ada.join_public("u1", "ada").await;
    let public = joined_room(&ada.events()).expect("joined public party");
    assert!(public.starts_with("PUB_"));

    assert!(lobby.store.find_party(private).await.unwrap().is_none());
    let parties = lobby
        .store
        .list_parties_with_member("u1".into())
        .await
        .unwrap();
    assert_eq!(parties.len(), 1);
    assert_eq!(parties[0].code, public);
}

#[tokio::test(start_paused = true)]
async fn full_public_parties_spill_into_a_new_one() {
    let lobby = Lobby::new();
    let mut codes = Vec::new();
    for n in 1..=5 {
        let id = format!("guest_{n}");
        let mut player = lobby.player(&id).await;
        player.join_public(&id, &format!("p{n}")).await;
        codes.push(joined_room(&player.events()).expect("seated"));
    }

    assert!(codes[..4].iter().all(|code| code == &codes[0]));
    assert_ne!(codes[4], codes[0]);

    let first = lobby.store.find_party(codes[0].clone()).await.unwrap().unwrap();
    assert_eq!(first.members.len(), 4);
    let colors: Vec<&str> = first.members.iter().map(|m| m.color.as_str()).collect();
    assert_eq!(colors, ["#ef4444", "#f97316", "#eab308", "#84cc16"]);

    let second = lobby.store.find_party(codes[4].clone()).await.unwrap().unwrap();
    assert_eq!(second.members.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn private_join_reports_missing_and_full_parties() {
    let lobby = Lobby::new();
    let mut guest = lobby.player("guest_x").await;

    guest.join_private("NOPE42", "guest_x", "x").await;
    assert_eq!(
        guest.events(),
        vec![ServerMessage::PartyError {
            message: "Party not found".into()
        }]
    );

    let mut config = AppConfig::default();
    config.private_party_size = 1;
    let small = Lobby::with_config(config);
    let mut host = small.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();

    let mut late = small.player("guest_l").await;
    late.join_private(&code, "guest_l", "late").await;
    assert_eq!(
        late.events(),
        vec![ServerMessage::PartyError {
            message: "Party is full".into()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn joining_announces_to_the_rest_of_the_room() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();

    let mut friend = lobby.player("guest_f").await;
    friend.join_private(&code.to_lowercase(), "guest_f", "friend").await;

    let friend_events = friend.events();
    let ServerMessage::JoinedParty {
        member_count,
        assigned_color,
        is_public,
        ..
    } = &friend_events[0]
    else {
        panic!("expected joined_party, got {friend_events:?}");
    };
    assert_eq!(*member_count, 2);
    assert_eq!(assigned_color, "#f97316");
    assert!(!is_public);

    let host_events = host.events();
    assert!(matches!(
        host_events[0],
        ServerMessage::PartyUpdate { member_count: 2, .. }
    ));
    assert_eq!(chat_lines(&host_events), ["friend joined!"]);
}

#[tokio::test(start_paused = true)]
async fn leaving_the_last_seat_deletes_the_party() {
    let lobby = Lobby::new();
    let mut host = lobby.player("u1").await;
    host.create_party("u1", "ada").await;
    let code = joined_room(&host.events()).unwrap();

    host.leave(&code).await;
    assert_eq!(host.events(), vec![ServerMessage::LeftParty]);
    assert!(lobby.store.find_party(code.clone()).await.unwrap().is_none());

    host.join_private(&code, "u1", "ada").await;
    assert_eq!(
        host.events(),
        vec![ServerMessage::PartyError {
            message: "Party not found".into()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn switching_parties_announces_the_departure_to_the_old_room_only() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();
    let mut mate = lobby.player("guest_m").await;
    mate.join_private(&code, "guest_m", "mate").await;
    mate.events();
    host.events();

    mate.join_public("guest_m", "mate").await;
    let events = mate.events();
    assert_eq!(events.len(), 1, "unexpected events {events:?}");
    let public = joined_room(&events).expect("seated in a public party");
    assert_ne!(public, code);

    let host_events = host.events();
    assert!(matches!(
        host_events[0],
        ServerMessage::PartyUpdate { member_count: 1, .. }
    ));
    assert_eq!(chat_lines(&host_events), ["mate left."]);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_party_drops_its_unfinished_match() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_a").await;
    host.create_party("guest_a", "a").await;
    let code = joined_room(&host.events()).unwrap();
    let mate = lobby.player("guest_b").await;
    mate.join_private(&code, "guest_b", "b").await;

    host.toggle_ready(&code).await;
    mate.toggle_ready(&code).await;
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(lobby.state.matches().get(&code).is_some());

    host.finish(&code, "guest_a").await;
    mate.leave(&code).await;
    assert!(lobby.state.matches().get(&code).is_some());
    host.leave(&code).await;

    assert!(lobby.store.find_party(code.clone()).await.unwrap().is_none());
    assert!(lobby.state.matches().get(&code).is_none());
    assert!(!lobby.state.match_retention().is_armed(&code));
}

#[tokio::test(start_paused = true)]
async fn countdown_starts_only_when_everyone_is_ready_and_restarts_after_cancel() {
    let lobby = Lobby::new();
    let mut a = lobby.player("guest_a").await;
    a.create_party("guest_a", "a").await;
    let code = joined_room(&a.events()).unwrap();
    let b = lobby.player("guest_b").await;
    b.join_private(&code, "guest_b", "b").await;
    let c = lobby.player("guest_c").await;
    c.join_private(&code, "guest_c", "c").await;

    a.toggle_ready(&code).await;
    b.toggle_ready(&code).await;
    settle().await;
    assert!(!lobby.state.countdowns().is_armed(&code));

    c.toggle_ready(&code).await;
    assert!(lobby.state.countdowns().is_armed(&code));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    a.events();

    b.toggle_ready(&code).await;
    assert!(!lobby.state.countdowns().is_armed(&code));
    let canceled = a.events();
    assert!(canceled.contains(&ServerMessage::CountdownCanceled));
    assert!(chat_lines(&canceled).contains(&"Match start canceled.".to_owned()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(lobby.state.matches().get(&code).is_none());
    assert!(
        !a.events()
            .iter()
            .any(|event| matches!(event, ServerMessage::MatchStart { .. }))
    );

    b.toggle_ready(&code).await;
    settle().await;
    assert_eq!(
        chat_lines(&a.events()).last().map(String::as_str),
        Some("Starting game in 3...")
    );

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let events = a.events();
    assert_eq!(
        chat_lines(&events),
        ["Starting game in 2...", "Starting game in 1...", "Starting game!"]
    );
    assert_eq!(
        events.last(),
        Some(&ServerMessage::MatchStart {
            match_id: code.clone()
        })
    );
    let started = lobby.state.matches().get(&code).expect("match started");
    assert_eq!(started.roster.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn finishing_ranks_players_and_settles_ratings_once() {
    let lobby = Lobby::new();
    for id in ["u1", "u2", "u3"] {
        lobby.register(id, id, 1200);
    }
    let mut first = lobby.player("u1").await;
    first.create_party("u1", "one").await;
    let code = joined_room(&first.events()).unwrap();
    let second = lobby.player("u2").await;
    second.join_private(&code, "u2", "two").await;
    let third = lobby.player("u3").await;
    third.join_private(&code, "u3", "three").await;

    for player in [&first, &second, &third] {
        player.toggle_ready(&code).await;
    }
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(lobby.state.matches().get(&code).is_some());
    first.events();

    first.finish(&code, "u1").await;
    let after_first = lobby.state.matches().get(&code).unwrap();
    first.finish(&code, "u1").await;
    assert_eq!(lobby.state.matches().get(&code).unwrap(), after_first);
    // Finishing for someone else is ignored.
    first.finish(&code, "u3").await;
    assert_eq!(lobby.state.matches().get(&code).unwrap(), after_first);

    second.finish(&code, "u2").await;
    third.finish(&code, "u3").await;

    let standings = lobby.state.matches().get(&code).unwrap();
    assert!(standings.complete);
    let ranks: Vec<(String, u32)> = standings
        .finishers()
        .map(|entry| (entry.identity.to_string(), entry.rank))
        .collect();
    assert_eq!(
        ranks,
        [("u1".into(), 1), ("u2".into(), 2), ("u3".into(), 3)]
    );

    let deltas: Vec<(String, i32)> = first
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ServerMessage::RatingUpdate { identity, delta, .. } => Some((identity, delta)),
            _ => None,
        })
        .collect();
    assert_eq!(
        deltas,
        [("u1".into(), 16), ("u2".into(), 0), ("u3".into(), -16)]
    );

    let one = lobby.store.user("u1").unwrap();
    assert_eq!((one.rating, one.xp, one.games_played), (1216, 80, 1));
    let two = lobby.store.user("u2").unwrap();
    assert_eq!((two.rating, two.xp, two.games_played), (1200, 70, 1));
    let three = lobby.store.user("u3").unwrap();
    assert_eq!((three.rating, three.xp, three.games_played), (1184, 60, 1));

    let party = lobby.store.find_party(code.clone()).await.unwrap().unwrap();
    assert!(party.members.iter().all(|member| !member.is_ready));
    let u1 = party
        .members
        .iter()
        .find(|member| member.id == "u1")
        .unwrap();
    assert_eq!(u1.rating, 1216);
    assert!(!lobby.state.countdowns().is_armed(&code));

    // A late duplicate after completion changes nothing and settles nothing.
    third.finish(&code, "u3").await;
    assert_eq!(lobby.store.user("u3").unwrap().rating, 1184);

    let query = format!(r#"{{"type":"get_match_state","room_code":"{code}"}}"#);
    first.send(&query).await;
    let replies = first.events();
    let Some(ServerMessage::MatchUpdate { state }) = replies.last() else {
        panic!("expected match standings, got {replies:?}");
    };
    assert!(state.complete);
    assert_eq!(state.finished.len(), 3);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(lobby.state.matches().get(&code).is_none());
    first.send(&query).await;
    assert!(first.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn guests_settle_into_their_party_snapshot_only() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_a").await;
    host.send(r#"{"type":"create_party","profile":{"_id":"guest_a","username":"a","elo":1500}}"#)
        .await;
    let code = joined_room(&host.events()).unwrap();
    let other = lobby.player("guest_b").await;
    other.join_private(&code, "guest_b", "b").await;

    host.toggle_ready(&code).await;
    other.toggle_ready(&code).await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    other.finish(&code, "guest_b").await;
    host.finish(&code, "guest_a").await;

    let party = lobby.store.find_party(code).await.unwrap().unwrap();
    let a = party
        .members
        .iter()
        .find(|member| member.id == "guest_a")
        .unwrap();
    let b = party
        .members
        .iter()
        .find(|member| member.id == "guest_b")
        .unwrap();
    assert!(a.rating < 1500);
    assert!(b.rating > 1200);
    assert_eq!((a.xp, a.games_played), (70, 1));
    assert_eq!((b.xp, b.games_played), (80, 1));
    assert!(lobby.store.user("guest_a").is_none());
    assert!(Identity::from("guest_a").is_guest());
}

#[tokio::test(start_paused = true)]
async fn chat_is_relayed_only_inside_the_senders_room() {
    let lobby = Lobby::new();
    let mut host = lobby.player("guest_h").await;
    host.create_party("guest_h", "host").await;
    let code = joined_room(&host.events()).unwrap();
    let mut outsider = lobby.player("guest_o").await;

    outsider
        .send(&format!(
            r#"{{"type":"send_chat","room":"{code}","text":"let me in"}}"#
        ))
        .await;
    assert!(host.events().is_empty());

    host.send(&format!(
        r##"{{"type":"send_chat","room":"{code}","text":"  gl hf  ","color":"#ef4444"}}"##
    ))
    .await;
    let events = host.events();
    assert_eq!(
        events,
        vec![ServerMessage::ChatMessage {
            room: code,
            user: "host".into(),
            text: "gl hf".into(),
            color: Some("#ef4444".into()),
            kind: ChatKind::User,
        }]
    );
    assert!(outsider.events().is_empty());
}
