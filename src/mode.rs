use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrintMode {
    #[default]
    QuestionOnly,
    WithAnswer,
    WithSolution,
    WithAll,
}

impl PrintMode {
    pub const ALL: [PrintMode; 4] = [
        PrintMode::QuestionOnly,
        PrintMode::WithAnswer,
        PrintMode::WithSolution,
        PrintMode::WithAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrintMode::QuestionOnly => "question-only",
            PrintMode::WithAnswer => "with-answer",
            PrintMode::WithSolution => "with-solution",
            PrintMode::WithAll => "with-all",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        PrintMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    pub fn shows_answers(self) -> bool {
        matches!(self, PrintMode::WithAnswer | PrintMode::WithAll)
    }

    pub fn shows_solutions(self) -> bool {
        matches!(self, PrintMode::WithSolution | PrintMode::WithAll)
    }
}

impl fmt::Display for PrintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The host's current mode selection. The host writes it when the user
/// switches mode; the print pipeline only reads it.
#[derive(Debug, Clone, Default)]
pub struct ModeRef {
    current: Rc<Cell<PrintMode>>,
}

impl ModeRef {
    pub fn new(mode: PrintMode) -> Self {
        Self {
            current: Rc::new(Cell::new(mode)),
        }
    }

    pub fn get(&self) -> PrintMode {
        self.current.get()
    }

    pub fn set(&self, mode: PrintMode) {
        self.current.set(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for mode in PrintMode::ALL {
            assert_eq!(PrintMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(PrintMode::parse("everything"), None);
    }

    #[test]
    fn expectations_follow_mode() {
        assert!(!PrintMode::QuestionOnly.shows_answers());
        assert!(!PrintMode::QuestionOnly.shows_solutions());
        assert!(PrintMode::WithAnswer.shows_answers());
        assert!(!PrintMode::WithAnswer.shows_solutions());
        assert!(PrintMode::WithSolution.shows_solutions());
        assert!(PrintMode::WithAll.shows_answers() && PrintMode::WithAll.shows_solutions());
    }

    #[test]
    fn mode_ref_clones_observe_writes() {
        let selection = ModeRef::new(PrintMode::WithAnswer);
        let reader = selection.clone();
        selection.set(PrintMode::WithSolution);
        assert_eq!(reader.get(), PrintMode::WithSolution);
    }
}
