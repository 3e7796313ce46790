/// Lifecycle of the one streaming price channel. There is no automatic
/// reconnect: leaving `Idle` always requires an explicit open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
}

/// Everything that can move the channel between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    OpenRequested,
    Established,
    ConnectFailed,
    CloseRequested,
    RemoteClosed,
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged, which is what makes `open` and `close` safe to call
/// redundantly.
pub fn step(state: ChannelState, event: ChannelEvent) -> ChannelState {
    use ChannelEvent::*;
    use ChannelState::*;

    match (state, event) {
        (Idle, OpenRequested) => Connecting,
        (Connecting, Established) => Open,
        (Connecting, ConnectFailed) => Idle,
        (Connecting, CloseRequested) => Idle,
        (Open, CloseRequested) => Idle,
        (Open, RemoteClosed) => Idle,
        // Anything else is a no-op: duplicate opens, closes while idle,
        // stale events arriving after teardown
        (s, _) => s,
    }
}
