//! Room lifecycle state machine and the per-room runtime bookkeeping
//! (listener handles, write counter, apply-remote guard).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

/// Whether the client synchronizes against a shared room or its personal
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Operating on the per-identity personal document.
    Unjoined,
    /// Operating on the shared room document.
    InRoom(Uuid),
}

impl RoomPhase {
    /// Room id when in a room.
    pub fn room_id(&self) -> Option<Uuid> {
        match self {
            RoomPhase::Unjoined => None,
            RoomPhase::InRoom(id) => Some(*id),
        }
    }
}

/// Error returned when attempting to apply an invalid room transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomTransitionError {
    /// Join attempted while already synchronizing a room.
    #[error("already in room {0}")]
    AlreadyInRoom(Uuid),
    /// Leave attempted while unjoined.
    #[error("not in a room")]
    NotInRoom,
}

/// Two-state machine guarding the "at most one active room" invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomStateMachine {
    phase: Option<Uuid>,
}

impl RoomStateMachine {
    /// Start unjoined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        match self.phase {
            None => RoomPhase::Unjoined,
            Some(id) => RoomPhase::InRoom(id),
        }
    }

    /// Transition `Unjoined -> InRoom`.
    pub fn join(&mut self, room: Uuid) -> Result<(), RoomTransitionError> {
        match self.phase {
            Some(current) => Err(RoomTransitionError::AlreadyInRoom(current)),
            None => {
                self.phase = Some(room);
                Ok(())
            }
        }
    }

    /// Transition `InRoom -> Unjoined`, returning the room that was left.
    pub fn leave(&mut self) -> Result<Uuid, RoomTransitionError> {
        self.phase.take().ok_or(RoomTransitionError::NotInRoom)
    }
}

/// A room participant as derived from the membership collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Member {
    /// Identity id.
    pub id: String,
    /// Display name, falling back to the id.
    pub name: String,
    /// Milliseconds timestamp of the last heartbeat.
    pub last_seen_ms: u64,
    /// Whether the last heartbeat is recent enough to count as online.
    pub online: bool,
}

/// Background task handle that is aborted when replaced or dropped.
#[derive(Debug)]
pub struct ListenerHandle(JoinHandle<()>);

impl ListenerHandle {
    /// Wrap a spawned listener task.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self(task)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One slot per listener kind; installing a new handle tears down its
/// predecessor, so duplicate delivery is impossible by construction.
#[derive(Debug, Default)]
pub struct ListenerSet {
    active_doc: Mutex<Option<ListenerHandle>>,
    members: Mutex<Option<ListenerHandle>>,
    messages: Mutex<Option<ListenerHandle>>,
    heartbeat: Mutex<Option<ListenerHandle>>,
}

/// The kinds of long-lived listeners/timers a client runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Snapshot listener on the active (room or personal) document.
    ActiveDoc,
    /// Snapshot listener on the room membership collection.
    Members,
    /// Snapshot listener on the room messages collection.
    Messages,
    /// Periodic presence heartbeat.
    Heartbeat,
}

impl ListenerSet {
    fn slot(&self, kind: ListenerKind) -> &Mutex<Option<ListenerHandle>> {
        match kind {
            ListenerKind::ActiveDoc => &self.active_doc,
            ListenerKind::Members => &self.members,
            ListenerKind::Messages => &self.messages,
            ListenerKind::Heartbeat => &self.heartbeat,
        }
    }

    /// Install a listener, aborting the previous one of the same kind.
    pub fn install(&self, kind: ListenerKind, task: JoinHandle<()>) {
        let mut slot = self.slot(kind).lock().expect("listener set poisoned");
        *slot = Some(ListenerHandle::new(task));
    }

    /// Stop one listener kind.
    pub fn stop(&self, kind: ListenerKind) {
        self.slot(kind).lock().expect("listener set poisoned").take();
    }

    /// Stop everything; used on room leave and shutdown.
    pub fn stop_all(&self) {
        for kind in [
            ListenerKind::ActiveDoc,
            ListenerKind::Members,
            ListenerKind::Messages,
            ListenerKind::Heartbeat,
        ] {
            self.stop(kind);
        }
    }
}

/// Reentrancy guard held while a remote snapshot is being applied; while any
/// guard is alive, `schedule_save` becomes a no-op.
#[derive(Debug)]
pub struct ApplyRemoteGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ApplyRemoteGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runtime bundle for room synchronization.
#[derive(Debug, Default)]
pub struct RoomState {
    machine: RwLock<RoomStateMachine>,
    members: RwLock<Vec<Member>>,
    listeners: ListenerSet,
    write_counter: AtomicU64,
    applying_remote: AtomicBool,
    last_auto_opened_pick: Mutex<Option<Uuid>>,
    last_playback_apply_ms: AtomicU64,
}

impl RoomState {
    /// Lock guarding the lifecycle machine.
    pub fn machine(&self) -> &RwLock<RoomStateMachine> {
        &self.machine
    }

    /// Snapshot the current phase.
    pub async fn phase(&self) -> RoomPhase {
        self.machine.read().await.phase()
    }

    /// Cached membership list maintained by the presence listener.
    pub fn members(&self) -> &RwLock<Vec<Member>> {
        &self.members
    }

    /// Listener registry.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Issue the next local write id. Strictly increasing for the process
    /// lifetime, which is exactly the scope the echo guard needs.
    pub fn next_write_id(&self) -> u64 {
        self.write_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Highest write id issued so far.
    pub fn last_issued_write_id(&self) -> u64 {
        self.write_counter.load(Ordering::SeqCst)
    }

    /// Enter the apply-remote critical section.
    pub fn begin_apply_remote(&self) -> ApplyRemoteGuard<'_> {
        self.applying_remote.store(true, Ordering::SeqCst);
        ApplyRemoteGuard {
            flag: &self.applying_remote,
        }
    }

    /// Whether a remote snapshot is currently being applied.
    pub fn is_applying_remote(&self) -> bool {
        self.applying_remote.load(Ordering::SeqCst)
    }

    /// Deduplicate auto-opens of the same pick broadcast. Returns `true` the
    /// first time a pick id is seen.
    pub fn mark_pick_seen(&self, pick_id: Uuid) -> bool {
        let mut slot = self
            .last_auto_opened_pick
            .lock()
            .expect("room state poisoned");
        if *slot == Some(pick_id) {
            false
        } else {
            *slot = Some(pick_id);
            true
        }
    }

    /// Monotonic gate for applying inbound playback updates. Returns `true`
    /// when `stamp_ms` is newer than anything applied before.
    pub fn advance_playback_stamp(&self, stamp_ms: u64) -> bool {
        let previous = self
            .last_playback_apply_ms
            .fetch_max(stamp_ms, Ordering::SeqCst);
        stamp_ms > previous
    }

    /// Forget room-scoped bookkeeping on leave.
    pub async fn reset_room_scoped(&self) {
        self.members.write().await.clear();
        *self
            .last_auto_opened_pick
            .lock()
            .expect("room state poisoned") = None;
        self.last_playback_apply_ms.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_then_leave_round_trips() {
        let mut machine = RoomStateMachine::new();
        assert_eq!(machine.phase(), RoomPhase::Unjoined);

        let room = Uuid::new_v4();
        machine.join(room).unwrap();
        assert_eq!(machine.phase(), RoomPhase::InRoom(room));

        assert_eq!(
            machine.join(Uuid::new_v4()),
            Err(RoomTransitionError::AlreadyInRoom(room))
        );

        assert_eq!(machine.leave(), Ok(room));
        assert_eq!(machine.phase(), RoomPhase::Unjoined);
        assert_eq!(machine.leave(), Err(RoomTransitionError::NotInRoom));
    }

    #[test]
    fn write_ids_are_strictly_increasing() {
        let state = RoomState::default();
        let a = state.next_write_id();
        let b = state.next_write_id();
        assert!(b > a);
        assert_eq!(state.last_issued_write_id(), b);
    }

    #[test]
    fn apply_remote_guard_is_scoped() {
        let state = RoomState::default();
        assert!(!state.is_applying_remote());
        {
            let _guard = state.begin_apply_remote();
            assert!(state.is_applying_remote());
        }
        assert!(!state.is_applying_remote());
    }

    #[test]
    fn pick_dedupe_fires_once_per_pick_id() {
        let state = RoomState::default();
        let pick = Uuid::new_v4();
        assert!(state.mark_pick_seen(pick));
        assert!(!state.mark_pick_seen(pick));
        assert!(state.mark_pick_seen(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn installing_a_listener_tears_down_its_predecessor() {
        let set = ListenerSet::default();

        let first = tokio::spawn(std::future::pending::<()>());
        let first_abort = first.abort_handle();
        set.install(ListenerKind::Members, first);

        set.install(ListenerKind::Members, tokio::spawn(std::future::pending::<()>()));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(first_abort.is_finished());

        set.stop_all();
    }

    #[test]
    fn playback_stamp_gate_is_monotonic() {
        let state = RoomState::default();
        assert!(state.advance_playback_stamp(10));
        assert!(!state.advance_playback_stamp(10));
        assert!(!state.advance_playback_stamp(5));
        assert!(state.advance_playback_stamp(11));
    }
}
