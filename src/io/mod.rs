// External I/O operations module
pub mod alarm; // Wall-clock alarm threads
pub mod dbus; // D-Bus system event monitoring
pub mod instance; // High-level instance management
pub mod lock; // Low-level lock file operations
pub mod signals; // Unix signal handling
pub mod state; // Persisted activation state
