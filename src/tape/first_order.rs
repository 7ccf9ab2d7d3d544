//! First-order reverse sweep.

use crate::float::Float;
use crate::tape::Tape;

impl<F: Float> Tape<F> {
    /// Gradient accumulation: seed the output with 1, then distribute each
    /// record's adjoint onto its independents, newest record first.
    ///
    /// A dependent's adjoint is read and zeroed before distribution. That
    /// keeps reassigned dependents correct: when a later record overwrote the
    /// same info, the older record starts from whatever adjoint the records
    /// in between accumulated, not from a stale sum.
    pub(crate) fn sweep_first_order(&mut self) {
        self.clear_adjoints();
        self.seed_output();

        for e in self.entries.iter().rev() {
            let Some(w) = e.w.upgrade() else { continue };
            let adj = w.adjoint.get();
            w.adjoint.set(F::zero());
            if adj == F::zero() {
                continue;
            }
            for (i, x) in e.ids.iter().enumerate() {
                x.adjoint.set(x.adjoint.get() + adj * e.local_first(i));
            }
        }
    }
}
