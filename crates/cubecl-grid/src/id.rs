#[macro_export]
/// Create a new unique ID type backed by a global counter.
macro_rules! unique_id_type {
    ($name:ident) => {
        /// Unique ID.
        #[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
        pub struct $name {
            value: usize,
        }

        impl $name {
            /// Create a new ID.
            pub fn new() -> Self {
                use core::sync::atomic::{AtomicUsize, Ordering};

                static COUNTER: AtomicUsize = AtomicUsize::new(0);

                let value = COUNTER.fetch_add(1, Ordering::Relaxed);
                if value == usize::MAX {
                    core::panic!("ID overflowed");
                }
                Self { value }
            }

            /// The raw value of the ID.
            pub fn value(&self) -> usize {
                self.value
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_fmt(core::format_args!("{}({})", core::stringify!($name), self.value))
            }
        }
    };
}

unique_id_type!(BufferId);
unique_id_type!(TaskId);
unique_id_type!(StreamId);
