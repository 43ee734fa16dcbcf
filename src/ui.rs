//! Immediate-mode parameter UI surface.
//!
//! Effects describe their controls through this trait; a host binds it to
//! whatever widget toolkit it uses. Every `add_*` call edits the value in
//! place and returns true when the user changed it this frame.

pub trait ParamUi {
    /// Opens a collapsible group. Returns false when the group is collapsed,
    /// in which case no widgets should be emitted and `end_group` must not be
    /// called.
    fn begin_group(&mut self, label: &str) -> bool;

    fn end_group(&mut self);

    fn add_float_var(&mut self, label: &str, value: &mut f32, min: f32) -> bool;

    fn add_int_var(&mut self, label: &str, value: &mut i32, min: i32, max: i32, step: i32) -> bool;
}

/// A `ParamUi` that applies queued edits and records what was drawn.
///
/// Useful for headless hosts (scripted parameter changes) and tests.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    pub group_open: bool,
    pub float_edits: Vec<(String, f32)>,
    pub int_edits: Vec<(String, i32)>,
    pub drawn: Vec<String>,
    pub groups_ended: usize,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self {
            group_open: true,
            ..Default::default()
        }
    }

    pub fn with_float(mut self, label: &str, value: f32) -> Self {
        self.float_edits.push((label.to_string(), value));
        self
    }

    pub fn with_int(mut self, label: &str, value: i32) -> Self {
        self.int_edits.push((label.to_string(), value));
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.group_open = false;
        self
    }
}

impl ParamUi for ScriptedUi {
    fn begin_group(&mut self, label: &str) -> bool {
        self.drawn.push(format!("group:{}", label));
        self.group_open
    }

    fn end_group(&mut self) {
        self.groups_ended += 1;
    }

    fn add_float_var(&mut self, label: &str, value: &mut f32, min: f32) -> bool {
        self.drawn.push(label.to_string());
        match self.float_edits.iter().position(|(l, _)| l == label) {
            Some(idx) => {
                let (_, v) = self.float_edits.remove(idx);
                *value = v.max(min);
                true
            }
            None => false,
        }
    }

    fn add_int_var(&mut self, label: &str, value: &mut i32, min: i32, max: i32, _step: i32) -> bool {
        self.drawn.push(label.to_string());
        match self.int_edits.iter().position(|(l, _)| l == label) {
            Some(idx) => {
                let (_, v) = self.int_edits.remove(idx);
                *value = v.clamp(min, max);
                true
            }
            None => false,
        }
    }
}
