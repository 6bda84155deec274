//! Generator state bridge between the native sampler and the plugin
//! runtime.
//!
//! Randomness-consuming plugin calls must observe the native generator's
//! position in the stream and advance it, exactly as if the draws had
//! happened natively. [`synchronized`] enforces the export/import
//! bracketing structurally: callers cannot forget either half.
use bnpmix_stats::Mt19937;

use crate::error::Error;
use crate::runtime::PluginRuntime;

/// Run `f` against the runtime generator, with the native generator's
/// state exported on the way in and imported back on the way out.
///
/// The runtime generator is held locked for the whole bracket; a second
/// synchronized call on another thread waits rather than interleaving
/// draws.
pub fn synchronized<T>(
    native: &mut Mt19937,
    runtime: &PluginRuntime,
    f: impl FnOnce(&mut Mt19937) -> Result<T, Error>,
) -> Result<T, Error> {
    runtime.with_generator(|gen| {
        gen.set_state(&native.state())?;
        let out = f(gen)?;
        native.set_state(&gen.state())?;
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn draws_inside_the_bracket_advance_the_native_stream() {
        let runtime = PluginRuntime::new();
        let mut bridged = Mt19937::new(1234);
        let mut reference = Mt19937::new(1234);

        let drawn = synchronized(&mut bridged, &runtime, |rng| Ok(rng.next_u32()))
            .unwrap();
        assert_eq!(drawn, reference.next_u32());
        // After the bracket both generators continue in lockstep.
        for _ in 0..100 {
            assert_eq!(bridged.next_u32(), reference.next_u32());
        }
    }

    #[test]
    fn bracket_with_no_draws_is_a_no_op() {
        let runtime = PluginRuntime::new();
        let mut rng = Mt19937::new(42);
        let before = rng.state();
        synchronized(&mut rng, &runtime, |_| Ok(())).unwrap();
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn runtime_stream_position_is_overwritten_not_resumed() {
        let runtime = PluginRuntime::new();
        // Burn some of the runtime generator's own stream.
        runtime.with_generator(|gen| {
            for _ in 0..17 {
                gen.next_u32();
            }
        });
        let mut native = Mt19937::new(7);
        let mut reference = Mt19937::new(7);
        let drawn =
            synchronized(&mut native, &runtime, |rng| Ok(rng.next_u32())).unwrap();
        assert_eq!(drawn, reference.next_u32());
    }

    #[test]
    fn plugin_error_leaves_the_native_generator_untouched() {
        let runtime = PluginRuntime::new();
        let mut rng = Mt19937::new(99);
        let before = rng.state();
        let res: Result<(), Error> = synchronized(&mut rng, &runtime, |gen| {
            gen.next_u32();
            Err(Error::Plugin {
                entry_point: "draw",
                message: "boom".into(),
            })
        });
        assert!(res.is_err());
        assert_eq!(rng.state(), before);
    }
}
