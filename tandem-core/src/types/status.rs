//! Channel lifecycle status and its transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a channel.
///
/// Statuses do not form a linear chain; [`ChannelStatus::can_transition_to`]
/// holds the full table of legal moves. `PreSetup` and `Init` are starting
/// points only and are never a legal target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelStatus {
    /// Created, contracts not yet set up.
    #[default]
    PreSetup,
    /// Contracts being set up.
    Setup,
    /// Initialized, ready to open.
    Init,
    /// Open for payments.
    Open,
    /// A dispute was raised.
    InConflict,
    /// Dispute settled on chain.
    Settled,
    /// Close requested, waiting for the peer.
    WaitingToClose,
    /// Virtual payment channel closing.
    VpcClosing,
    /// Virtual payment channel closed.
    VpcClosed,
    /// Channel closed.
    Closed,
}

impl ChannelStatus {
    /// All statuses, in declaration order.
    pub const ALL: [ChannelStatus; 10] = [
        ChannelStatus::PreSetup,
        ChannelStatus::Setup,
        ChannelStatus::Init,
        ChannelStatus::Open,
        ChannelStatus::InConflict,
        ChannelStatus::Settled,
        ChannelStatus::WaitingToClose,
        ChannelStatus::VpcClosing,
        ChannelStatus::VpcClosed,
        ChannelStatus::Closed,
    ];

    /// Returns true if a channel in `self` may move to `target`.
    pub fn can_transition_to(self, target: ChannelStatus) -> bool {
        use ChannelStatus::*;

        match target {
            Setup => self == PreSetup,
            Open => self == Init,
            InConflict => matches!(self, Open | WaitingToClose),
            Settled => self == InConflict,
            WaitingToClose => self == Open,
            VpcClosing => self == Settled,
            VpcClosed => self == VpcClosing,
            Closed => matches!(self, Init | VpcClosing | VpcClosed | WaitingToClose),
            PreSetup | Init => false,
        }
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelStatus::PreSetup => "pre-setup",
            ChannelStatus::Setup => "setup",
            ChannelStatus::Init => "init",
            ChannelStatus::Open => "open",
            ChannelStatus::InConflict => "in-conflict",
            ChannelStatus::Settled => "settled",
            ChannelStatus::WaitingToClose => "waiting-to-close",
            ChannelStatus::VpcClosing => "vpc-closing",
            ChannelStatus::VpcClosed => "vpc-closed",
            ChannelStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
