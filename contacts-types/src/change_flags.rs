/// Per-detail / per-contact change-flags bitmask (spec.md §3, §4.G).
///
/// The state machine is `Clean -> Added -> Modified -> Deleted`, cleared back
/// to `Clean` only by an explicit clear-flags request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeFlags(u8);

impl ChangeFlags {
    pub const CLEAN: ChangeFlags = ChangeFlags(0);
    const IS_ADDED: u8 = 0b001;
    const IS_MODIFIED: u8 = 0b010;
    const IS_DELETED: u8 = 0b100;

    pub const fn added() -> Self {
        ChangeFlags(Self::IS_ADDED)
    }

    pub const fn modified() -> Self {
        ChangeFlags(Self::IS_MODIFIED)
    }

    pub const fn deleted() -> Self {
        ChangeFlags(Self::IS_DELETED)
    }

    pub const fn from_bits(bits: u8) -> Self {
        ChangeFlags(bits & (Self::IS_ADDED | Self::IS_MODIFIED | Self::IS_DELETED))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_clean(self) -> bool {
        self.0 == 0
    }

    pub const fn is_added(self) -> bool {
        self.0 & Self::IS_ADDED != 0
    }

    pub const fn is_modified(self) -> bool {
        self.0 & Self::IS_MODIFIED != 0
    }

    pub const fn is_deleted(self) -> bool {
        self.0 & Self::IS_DELETED != 0
    }

    pub const fn cleared(self) -> Self {
        ChangeFlags(0)
    }

    /// Applies the transition rule from spec.md §4.G on a detail/contact that
    /// is being edited (not removed): new rows stay/become `Added`; rows that
    /// are `Clean` or already `Modified` become `Modified`; rows that are
    /// already `Deleted` are left untouched by callers (editing a tombstone
    /// is not a supported path).
    pub fn on_edit(self) -> Self {
        if self.is_added() {
            ChangeFlags::added()
        } else if self.is_deleted() {
            self
        } else {
            ChangeFlags::modified()
        }
    }

    /// Applies the transition rule for a delete: always becomes `Deleted`,
    /// regardless of prior state.
    pub fn on_delete(self) -> Self {
        ChangeFlags::deleted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_transitions() {
        assert!(ChangeFlags::CLEAN.on_edit().is_modified());
        assert!(ChangeFlags::added().on_edit().is_added());
        assert!(ChangeFlags::modified().on_edit().is_modified());
    }

    #[test]
    fn delete_always_wins() {
        assert!(ChangeFlags::added().on_delete().is_deleted());
        assert!(ChangeFlags::modified().on_delete().is_deleted());
        assert!(ChangeFlags::CLEAN.on_delete().is_deleted());
    }
}
