//! Click-to-edit fields
//!
//! - inline.rs: InlineEdit buffer and commit-trigger state machine
//! - optimistic.rs: apply / commit / reconcile pattern and the four edited
//!   fields (speaker label, recording title, recording date, minutes body)

pub mod inline;
pub mod optimistic;

pub use inline::{CommitDecision, EditTrigger, FieldKind, InlineEdit};
pub use optimistic::{
    commit_optimistic, DateEdit, EditOutcome, MinutesBodyEdit, OptimisticEdit, SpeakerRenameEdit, TitleEdit,
};
