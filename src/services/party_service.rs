use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    dao::lobby_store::LobbyStore,
    dto::ws::{ChatKind, ProfileDto, ServerMessage},
    error::{PartyError, ServiceError},
    services::{countdown_service, events},
    state::{
        RoomGuard, SharedState,
        identity::{Identity, PlayerStats},
        party::{Member, Party, PartyKind},
        rooms::{ConnectionHandle, GLOBAL_GROUP},
    },
};

/// Attempts at claiming an open public party before opening a fresh one.
const PUBLIC_CLAIM_ATTEMPTS: usize = 3;

/// Why a member is leaving a party; selects the announcement shown to the rest of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Explicit `leave_party`, or the implicit leave before joining elsewhere.
    Left,
    /// Disconnect grace period expired.
    Disconnected,
}

impl Departure {
    fn announcement(self, username: &str) -> String {
        match self {
            Departure::Left => format!("{username} left."),
            Departure::Disconnected => format!("{username} disconnected."),
        }
    }
}

/// Open a private party with the caller as its leader.
pub async fn create_party(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    profile: &ProfileDto,
) -> Result<(), ServiceError> {
    ensure_profile(identity, profile)?;
    leave_all(state, identity, Departure::Left).await?;

    let store = state.require_store().await?;
    let stats = resolve_stats(&store, identity, profile).await?;
    let config = state.config();

    let code = {
        let (code, _room) = allocate_code(state, &store, PartyKind::Private).await?;
        let mut party = Party::new(code.clone(), PartyKind::Private, config.private_party_size);
        admit(state, &store, connection, identity, profile, stats, &mut party, true).await?;
        info!(room = %code, identity = %identity, "private party created");
        code
    };

    remember_party(&store, identity, Some(code)).await;
    Ok(())
}

/// Seat the caller in the oldest public party with room left, opening one when all are full.
pub async fn join_public(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    profile: &ProfileDto,
) -> Result<(), ServiceError> {
    ensure_profile(identity, profile)?;
    leave_all(state, identity, Departure::Left).await?;

    let store = state.require_store().await?;
    let stats = resolve_stats(&store, identity, profile).await?;
    let capacity = state.config().public_party_size;

    let code = {
        let _matchmaking = state.public_matchmaking().lock().await;
        let (mut party, _room) = claim_public_party(state, &store, capacity).await?;
        admit(state, &store, connection, identity, profile, stats, &mut party, false).await?;
        party.code
    };

    remember_party(&store, identity, Some(code)).await;
    Ok(())
}

/// Seat the caller in the party identified by `code`.
///
/// Joining a party the caller already sits in only resends the room snapshot.
pub async fn join_private(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    code: &str,
    profile: &ProfileDto,
) -> Result<(), ServiceError> {
    ensure_profile(identity, profile)?;
    leave_all_except(state, identity, Departure::Left, Some(code)).await?;

    let store = state.require_store().await?;
    let stats = resolve_stats(&store, identity, profile).await?;

    {
        let _room = state.lock_room(code).await;
        let mut party = load_party(&store, code)
            .await?
            .ok_or(PartyError::PartyNotFound)?;
        if party.contains(identity) {
            enter_room(state, connection, identity, &party);
            return Ok(());
        }
        if party.is_full() {
            return Err(PartyError::PartyFull.into());
        }
        admit(state, &store, connection, identity, profile, stats, &mut party, false).await?;
    }

    remember_party(&store, identity, Some(code.to_owned())).await;
    Ok(())
}

/// Flip the caller's ready flag, then start or cancel the room countdown accordingly.
pub async fn toggle_ready(
    state: &SharedState,
    identity: &Identity,
    room_code: &str,
    profile: Option<&ProfileDto>,
) -> Result<(), ServiceError> {
    if let Some(profile) = profile {
        ensure_profile(identity, profile)?;
    }
    let store = state.require_store().await?;

    let _room = state.lock_room(room_code).await;
    let mut party = load_party(&store, room_code)
        .await?
        .ok_or(PartyError::PartyNotFound)?;
    let ready = party
        .toggle_ready(identity)
        .ok_or(PartyError::NotInParty)?;
    store.save_party(party.clone().into()).await?;
    debug!(room = %room_code, identity = %identity, ready, "readiness toggled");

    state
        .hub()
        .broadcast(room_code, &events::party_update(&party));

    if party.all_ready() {
        countdown_service::start(state, room_code);
    } else {
        countdown_service::cancel(state, room_code);
    }
    Ok(())
}

/// Leave the caller's party and return its connection to the global group.
///
/// `left_party` is always sent, even when the caller was not in a party.
pub async fn leave_party(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    room_code: Option<&str>,
) -> Result<(), ServiceError> {
    if state.removals().cancel(identity) {
        debug!(identity = %identity, "pending removal canceled by explicit leave");
    }

    let outcome = match room_code {
        Some(code) => match remove_member(state, code, identity, Departure::Left).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => leave_all(state, identity, Departure::Left).await,
            Err(err) => Err(err),
        },
        None => leave_all(state, identity, Departure::Left).await,
    };

    state.hub().move_to(connection.id, GLOBAL_GROUP);
    connection.send(ServerMessage::LeftParty);
    outcome
}

/// `sync_state`: put the caller's connection back into its party, if it has one.
pub async fn sync_state(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    profile: &ProfileDto,
) -> Result<(), ServiceError> {
    ensure_profile(identity, profile)?;
    resync(state, connection, identity).await?;
    Ok(())
}

/// Rejoin `connection` to the room `identity` belongs to and send it the room snapshot.
///
/// Returns whether a party was found.
pub async fn resync(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
) -> Result<bool, ServiceError> {
    let store = state.require_store().await?;
    let Some(code) = locate_party(&store, identity).await? else {
        return Ok(false);
    };

    let _room = state.lock_room(&code).await;
    let Some(party) = load_party(&store, &code).await? else {
        return Ok(false);
    };
    if !party.contains(identity) {
        return Ok(false);
    }
    enter_room(state, connection, identity, &party);
    info!(room = %code, identity = %identity, "connection restored to party");
    Ok(true)
}

/// Remove `identity` from every party it sits in.
pub async fn leave_all(
    state: &SharedState,
    identity: &Identity,
    departure: Departure,
) -> Result<(), ServiceError> {
    leave_all_except(state, identity, departure, None).await
}

async fn leave_all_except(
    state: &SharedState,
    identity: &Identity,
    departure: Departure,
    keep: Option<&str>,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let parties = store
        .list_parties_with_member(identity.as_str().to_owned())
        .await?;
    for party in parties {
        if keep == Some(party.code.as_str()) {
            continue;
        }
        remove_member(state, &party.code, identity, departure).await?;
    }
    Ok(())
}

/// Remove `identity` from party `code`, deleting the party once empty.
///
/// Returns the departed member, or `None` when the party or the membership no longer exists.
pub async fn remove_member(
    state: &SharedState,
    code: &str,
    identity: &Identity,
    departure: Departure,
) -> Result<Option<Member>, ServiceError> {
    let store = state.require_store().await?;

    let member = {
        let _room = state.lock_room(code).await;
        let Some(mut party) = load_party(&store, code).await? else {
            return Ok(None);
        };
        let Some(member) = party.remove_member(identity) else {
            return Ok(None);
        };
        countdown_service::cancel(state, code);

        // The leaver's socket must not hear its own departure.
        if let Some(owner) = state.sessions().owner(identity) {
            if state.hub().group_of(owner.id).as_deref() == Some(code) {
                state.hub().move_to(owner.id, GLOBAL_GROUP);
            }
        }

        if party.is_empty() {
            store.delete_party(code.to_owned()).await?;
            state.match_retention().cancel(&code.to_owned());
            if state.matches().remove(code) {
                debug!(room = %code, "match of deleted party dropped");
            }
            info!(room = %code, "last member left; party deleted");
        } else {
            store.save_party(party.clone().into()).await?;
            let hub = state.hub();
            hub.broadcast(code, &events::party_update(&party));
            hub.broadcast(
                code,
                &events::system_chat(
                    code,
                    departure.announcement(&member.username),
                    ChatKind::System,
                ),
            );
        }
        info!(room = %code, identity = %identity, reason = ?departure, "member removed");
        member
    };

    remember_party(&store, identity, None).await;
    Ok(Some(member))
}

/// Append the caller to `party`, persist it and tell everyone. Callers hold the room lock.
#[allow(clippy::too_many_arguments)]
async fn admit(
    state: &SharedState,
    store: &Arc<dyn LobbyStore>,
    connection: &ConnectionHandle,
    identity: &Identity,
    profile: &ProfileDto,
    stats: PlayerStats,
    party: &mut Party,
    leader: bool,
) -> Result<(), ServiceError> {
    let color = state.config().first_unused_color(&party.used_colors());
    party
        .push_member(Member {
            identity: identity.clone(),
            username: profile.username.clone(),
            is_leader: leader,
            color,
            is_ready: false,
            stats,
        })
        .map_err(|_| PartyError::PartyFull)?;
    store.save_party(party.clone().into()).await?;

    // A fresh member is never ready, so any running countdown is void.
    countdown_service::cancel(state, &party.code);

    enter_room(state, connection, identity, party);
    let hub = state.hub();
    hub.broadcast_except(&party.code, connection.id, &events::party_update(party));
    hub.broadcast_except(
        &party.code,
        connection.id,
        &events::system_chat(
            &party.code,
            format!("{} joined!", profile.username),
            ChatKind::System,
        ),
    );
    info!(
        room = %party.code,
        identity = %identity,
        members = party.members.len(),
        "member joined"
    );
    Ok(())
}

/// Move `connection` into the room group and send it the room snapshot.
fn enter_room(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    party: &Party,
) {
    let hub = state.hub();
    hub.move_to(connection.id, &party.code);
    if let Some(member) = party.member(identity) {
        hub.set_display_name(connection.id, &member.username);
    }
    connection.send(events::joined_party(party, identity));
}

/// Pick an open public party under its room lock, or open a new one.
async fn claim_public_party<'a>(
    state: &'a SharedState,
    store: &Arc<dyn LobbyStore>,
    capacity: usize,
) -> Result<(Party, RoomGuard<'a>), ServiceError> {
    for _ in 0..PUBLIC_CLAIM_ATTEMPTS {
        let Some(candidate) = store.find_open_public_party(capacity).await? else {
            break;
        };
        let room = state.lock_room(&candidate.code).await;
        match load_party(store, &candidate.code).await? {
            Some(party) if !party.is_full() => return Ok((party, room)),
            _ => debug!(room = %candidate.code, "public party filled up meanwhile"),
        }
    }

    let (code, room) = allocate_code(state, store, PartyKind::Public).await?;
    info!(room = %code, "public party opened");
    Ok((Party::new(code, PartyKind::Public, capacity), room))
}

/// Draw codes until one is free, returning it with its room lock held.
async fn allocate_code<'a>(
    state: &'a SharedState,
    store: &Arc<dyn LobbyStore>,
    kind: PartyKind,
) -> Result<(String, RoomGuard<'a>), ServiceError> {
    loop {
        let code = kind.generate_code();
        let room = state.lock_room(&code).await;
        if store.find_party(code.clone()).await?.is_none() {
            return Ok((code, room));
        }
        debug!(room = %code, "party code collision; drawing again");
    }
}

/// Code of the party `identity` sits in, falling back to the account's durable reference.
async fn locate_party(
    store: &Arc<dyn LobbyStore>,
    identity: &Identity,
) -> Result<Option<String>, ServiceError> {
    if let Some(party) = store
        .find_party_by_member(identity.as_str().to_owned())
        .await?
    {
        return Ok(Some(party.code));
    }
    let Some(account_id) = identity.account_id() else {
        return Ok(None);
    };
    Ok(store
        .find_user(account_id.to_owned())
        .await?
        .and_then(|user| user.current_party))
}

async fn load_party(
    store: &Arc<dyn LobbyStore>,
    code: &str,
) -> Result<Option<Party>, ServiceError> {
    Ok(store.find_party(code.to_owned()).await?.map(Party::from))
}

/// Stats denormalized into the member record: claimed by guests, read from the account otherwise.
async fn resolve_stats(
    store: &Arc<dyn LobbyStore>,
    identity: &Identity,
    profile: &ProfileDto,
) -> Result<PlayerStats, ServiceError> {
    match identity {
        Identity::Guest { .. } => Ok(profile.claimed_stats()),
        Identity::Registered { account_id } => Ok(store
            .find_user(account_id.clone())
            .await?
            .map(|user| PlayerStats {
                rating: user.rating,
                xp: user.xp,
                games_played: user.games_played,
            })
            .unwrap_or_default()),
    }
}

/// Record the account's current party. Guests have nothing to record.
async fn remember_party(store: &Arc<dyn LobbyStore>, identity: &Identity, code: Option<String>) {
    let Some(account_id) = identity.account_id() else {
        return;
    };
    if let Err(err) = store.set_current_party(account_id.to_owned(), code).await {
        warn!(identity = %identity, error = %err, "failed to update current party reference");
    }
}

fn ensure_profile(identity: &Identity, profile: &ProfileDto) -> Result<(), PartyError> {
    if profile.matches(identity) {
        Ok(())
    } else {
        Err(PartyError::ProfileMismatch)
    }
}
