//! The host's view of one editable focus target.

use crate::panel::InputPanel;
use crate::surrounding::SurroundingText;

/// Stable identity of an input context within the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputContextId(pub u64);

/// Capabilities advertised by the client application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilityFlags(pub u64);

impl CapabilityFlags {
    pub const NONE: CapabilityFlags = CapabilityFlags(0);
    /// Client draws the preedit itself.
    pub const PREEDIT: CapabilityFlags = CapabilityFlags(1 << 1);
    pub const PASSWORD: CapabilityFlags = CapabilityFlags(1 << 3);
    pub const FORMATTED_PREEDIT: CapabilityFlags = CapabilityFlags(1 << 4);
    pub const SURROUNDING_TEXT: CapabilityFlags = CapabilityFlags(1 << 6);

    pub fn test(self, flag: CapabilityFlags) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for CapabilityFlags {
    type Output = CapabilityFlags;

    fn bitor(self, rhs: CapabilityFlags) -> CapabilityFlags {
        CapabilityFlags(self.0 | rhs.0)
    }
}

/// Parts of the host UI that can be asked to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserInterfaceComponent {
    InputPanel,
    StatusArea,
}

/// Host input context.
///
/// The adapter mutates the panel model freely and then asks the host to
/// flush it with `update_preedit` / `update_user_interface`; nothing is
/// shown until those are called.
pub trait InputContext {
    fn id(&self) -> InputContextId;

    fn capability_flags(&self) -> CapabilityFlags;

    fn surrounding_text(&self) -> &SurroundingText;

    fn surrounding_text_mut(&mut self) -> &mut SurroundingText;

    fn input_panel(&self) -> &InputPanel;

    fn input_panel_mut(&mut self) -> &mut InputPanel;

    /// Insert finalized text into the client.
    fn commit_string(&mut self, text: &str);

    /// Flush preedit slots to the client.
    fn update_preedit(&mut self);

    fn update_user_interface(&mut self, component: UserInterfaceComponent);
}
