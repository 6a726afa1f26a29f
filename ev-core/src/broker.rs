//! Publish/coalesce data broker (§4.7).
//!
//! Maps capability quantities to subscriber callbacks, with optional
//! two-sample averaging applied at drain time.

use crate::types::{Capability, CapabilityMask};
use std::sync::Mutex;

type Subscriber = Box<dyn FnMut(f32) + Send>;

struct Entry {
    subscriber: Option<Subscriber>,
    newest: f32,
    previous: f32,
    updated: bool,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            subscriber: None,
            newest: 0.0,
            previous: 0.0,
            updated: false,
        }
    }
}

/// Coalesces decoder output per capability bit and fans it out to
/// registered observers on `drain`.
pub struct DataBroker {
    entries: Mutex<enum_map::EnumMap<Capability, Entry>>,
    fast_average: bool,
}

mod enum_map {
    //! Tiny fixed-size map keyed by `Capability`, avoiding a dependency on
    //! a full enum-map crate for twelve known variants.
    use super::{Capability, Entry};
    use enumset::EnumSet;

    pub struct EnumMap<K, V> {
        values: Vec<V>,
        _marker: std::marker::PhantomData<K>,
    }

    impl EnumMap<Capability, Entry> {
        pub fn new() -> Self {
            let count = EnumSet::<Capability>::all().len();
            let mut values = Vec::with_capacity(count);
            values.resize_with(count, Entry::default);
            Self {
                values,
                _marker: std::marker::PhantomData,
            }
        }

        pub fn get(&self, cap: Capability) -> &Entry {
            &self.values[cap as usize]
        }

        pub fn get_mut(&mut self, cap: Capability) -> &mut Entry {
            &mut self.values[cap as usize]
        }

        pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Entry)> {
            self.values.iter_mut().enumerate()
        }
    }
}

impl DataBroker {
    #[must_use]
    pub fn new(fast_average: bool) -> Self {
        Self {
            entries: Mutex::new(enum_map::EnumMap::new()),
            fast_average,
        }
    }

    /// Register a callback for the lowest set bit of `mask`.
    pub fn register_callback(&self, mask: CapabilityMask, callback: impl FnMut(f32) + Send + 'static) {
        let Some(cap) = mask.iter().next() else {
            return;
        };
        let mut entries = self.entries.lock().expect("broker mutex poisoned");
        entries.get_mut(cap).subscriber = Some(Box::new(callback));
    }

    /// Record a new value for the lowest set bit of `mask`.
    pub fn set_value(&self, mask: CapabilityMask, value: f32) {
        let Some(cap) = mask.iter().next() else {
            return;
        };
        let mut entries = self.entries.lock().expect("broker mutex poisoned");
        let entry = entries.get_mut(cap);
        entry.previous = entry.newest;
        entry.newest = value;
        entry.updated = true;
    }

    /// Invoke every updated subscriber once, then clear the updated
    /// flags. Called from the observer loop, never from a decoder.
    pub fn drain(&self) {
        let mut entries = self.entries.lock().expect("broker mutex poisoned");
        for (_, entry) in entries.iter_mut() {
            if !entry.updated {
                continue;
            }
            let delivered = if self.fast_average {
                (entry.newest + entry.previous) / 2.0
            } else {
                entry.newest
            };
            if let Some(cb) = entry.subscriber.as_mut() {
                cb(delivered);
            }
            entry.updated = false;
        }
    }

    /// Read the current value for a capability without draining, used by
    /// decoders that need a previously-published reading (e.g. a torque
    /// decoder consulting a gear-position reading published earlier).
    #[must_use]
    pub fn peek(&self, cap: Capability) -> f32 {
        self.entries.lock().expect("broker mutex poisoned").get(cap).newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn simple_publish_and_drain() {
        let broker = DataBroker::new(false);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        broker.register_callback(Capability::HvBatteryVoltage.into(), move |v| {
            seen2.lock().unwrap().push(v);
        });
        broker.set_value(Capability::HvBatteryVoltage.into(), 14.4);
        broker.drain();
        assert_eq!(*seen.lock().unwrap(), vec![14.4]);
    }

    #[test]
    fn fast_average_delivers_mean_of_two_samples() {
        let broker = DataBroker::new(true);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        broker.register_callback(Capability::HvBatteryVoltage.into(), move |v| {
            seen2.lock().unwrap().push(v);
        });
        broker.set_value(Capability::HvBatteryVoltage.into(), 360.0);
        broker.set_value(Capability::HvBatteryVoltage.into(), 362.0);
        broker.drain();
        assert_eq!(*seen.lock().unwrap(), vec![361.0]);
    }

    #[test]
    fn drain_without_update_does_not_invoke_subscriber() {
        let broker = DataBroker::new(false);
        let seen = Arc::new(StdMutex::new(0));
        let seen2 = seen.clone();
        broker.register_callback(Capability::Speed.into(), move |_| {
            *seen2.lock().unwrap() += 1;
        });
        broker.drain();
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn only_the_updated_subscriber_is_invoked() {
        let broker = DataBroker::new(false);
        let voltage_calls = Arc::new(StdMutex::new(0));
        let speed_calls = Arc::new(StdMutex::new(0));
        let vc = voltage_calls.clone();
        let sc = speed_calls.clone();
        broker.register_callback(Capability::HvBatteryVoltage.into(), move |_| {
            *vc.lock().unwrap() += 1;
        });
        broker.register_callback(Capability::Speed.into(), move |_| {
            *sc.lock().unwrap() += 1;
        });
        broker.set_value(Capability::Speed.into(), 42.0);
        broker.drain();
        assert_eq!(*voltage_calls.lock().unwrap(), 0);
        assert_eq!(*speed_calls.lock().unwrap(), 1);
    }
}
