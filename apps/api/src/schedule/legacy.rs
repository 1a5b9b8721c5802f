//! Question id reference scheme.
//!
//! Older content numbered the parts of a multi-part question `<stem>_q1`,
//! `<stem>_q2`, ...; the current scheme keeps a single canonical `<stem>_q0`.
//! Schedule entries written under the old scheme are repaired by mapping a
//! numbered id onto its canonical form.

/// Version tag of the repair pass. Bump when the mapping rules change.
pub const REPAIR_SCHEME_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionRef<'a> {
    /// Anything that is not an old-style numbered part.
    Canonical(&'a str),
    /// `<stem>_q<N>` with N a positive integer.
    LegacyNumbered { stem: &'a str, part: u64 },
}

impl<'a> QuestionRef<'a> {
    pub fn classify(id: &'a str) -> Self {
        let Some(idx) = id.rfind("_q") else {
            return QuestionRef::Canonical(id);
        };
        let (stem, digits) = (&id[..idx], &id[idx + 2..]);
        if stem.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return QuestionRef::Canonical(id);
        }
        match digits.parse::<u64>() {
            Ok(part) if part > 0 => QuestionRef::LegacyNumbered { stem, part },
            _ => QuestionRef::Canonical(id),
        }
    }

    /// The id this reference should point at under the current scheme,
    /// or `None` when the reference is already canonical.
    pub fn canonical_candidate(&self) -> Option<String> {
        match self {
            QuestionRef::Canonical(_) => None,
            QuestionRef::LegacyNumbered { stem, .. } => Some(format!("{stem}_q0")),
        }
    }
}
