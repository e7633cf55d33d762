//! Break and continue targets of the enclosing loops and switches.

use crate::bytecode::Label;

#[derive(Debug)]
struct JumpContext {
    break_label: Label,
    /// `None` for a switch: `continue` goes to the enclosing loop.
    continue_label: Option<Label>,
}

/// Stack of jump contexts, innermost last.
#[derive(Debug, Default)]
pub struct JumpTargets {
    contexts: Vec<JumpContext>,
}

impl JumpTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(&mut self, break_label: Label, continue_label: Label) {
        self.contexts.push(JumpContext {
            break_label,
            continue_label: Some(continue_label),
        });
    }

    pub fn enter_switch(&mut self, break_label: Label) {
        self.contexts.push(JumpContext {
            break_label,
            continue_label: None,
        });
    }

    pub fn exit(&mut self) {
        self.contexts.pop();
    }

    pub fn break_target(&self) -> Option<Label> {
        self.contexts.last().map(|c| c.break_label)
    }

    /// Continue target of the innermost loop, skipping switches.
    pub fn continue_target(&self) -> Option<Label> {
        self.contexts.iter().rev().find_map(|c| c.continue_label)
    }

    pub fn depth(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_skips_switch_contexts() {
        let mut targets = JumpTargets::new();
        targets.enter_loop(Label(0), Label(1));
        targets.enter_switch(Label(2));
        assert_eq!(targets.break_target(), Some(Label(2)));
        assert_eq!(targets.continue_target(), Some(Label(1)));
        targets.exit();
        assert_eq!(targets.break_target(), Some(Label(0)));
        targets.exit();
        assert_eq!(targets.depth(), 0);
        assert_eq!(targets.continue_target(), None);
    }
}
