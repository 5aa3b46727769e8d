use crate::autograd::tape::Tape;

/// Scoped switch that turns off gradient recording on one tape.
///
/// The previous state is restored on drop, so guards nest.
#[must_use = "recording is re-enabled as soon as the guard is dropped"]
pub struct NoGradGuard<'t> {
    tape: &'t Tape,
    previous: bool,
}

impl<'t> NoGradGuard<'t> {
    pub(crate) fn new(tape: &'t Tape) -> Self {
        let previous = tape.is_grad_enabled();
        tape.set_grad_enabled(false);
        NoGradGuard { tape, previous }
    }
}

impl Drop for NoGradGuard<'_> {
    fn drop(&mut self) {
        self.tape.set_grad_enabled(self.previous);
    }
}
