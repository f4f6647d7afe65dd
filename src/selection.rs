use log::info;

/// Roster navigation input, independent of where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCommand {
    Next,
    Prev,
    Confirm,
}

impl SelectionCommand {
    /// Maps DOM style (`ArrowRight`) and short (`Right`) key names.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let command = match name.trim() {
            "ArrowRight" | "Right" => Self::Next,
            "ArrowLeft" | "Left" => Self::Prev,
            "Enter" | "Return" => Self::Confirm,
            _ => return None,
        };
        Some(command)
    }
}

/// What a command asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Load the entity at this index.
    Select(usize),
    /// The entity at this index was locked in.
    Confirmed(usize),
}

/// Current position in a roster of `len` entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCursor {
    len: usize,
    current: Option<usize>,
}

impl SelectionCursor {
    pub fn new(len: usize) -> Self {
        Self { len, current: None }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Moves right, wrapping to the first entity.
    pub fn next(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let index = self.current.map_or(0, |current| (current + 1) % self.len);
        self.current = Some(index);
        Some(index)
    }

    /// Moves left, wrapping to the last entity.
    pub fn prev(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let index = self
            .current
            .map_or(self.len - 1, |current| (current + self.len - 1) % self.len);
        self.current = Some(index);
        Some(index)
    }

    /// Jumps to `index`. Returns `None` when it is already selected or does
    /// not exist, in which case nothing needs reloading.
    pub fn pick(&mut self, index: usize) -> Option<usize> {
        if index >= self.len || self.current == Some(index) {
            return None;
        }
        self.current = Some(index);
        Some(index)
    }

    pub fn confirm(&self) -> Option<usize> {
        let index = self.current?;
        info!("locked in entity {index}");
        Some(index)
    }

    pub fn apply(&mut self, command: SelectionCommand) -> Option<SelectionEvent> {
        match command {
            SelectionCommand::Next => self.next().map(SelectionEvent::Select),
            SelectionCommand::Prev => self.prev().map(SelectionEvent::Select),
            SelectionCommand::Confirm => self.confirm().map(SelectionEvent::Confirmed),
        }
    }
}
