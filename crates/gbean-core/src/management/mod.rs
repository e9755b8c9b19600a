//! # GBean Management Bridge
//!
//! Management-facing view of the kernel. The [`ManagementBridge`] listens to
//! every lifecycle event and keeps one [`ServiceShadow`] per loaded service.
//! A shadow exposes the kernel-level attributes (`state`, `startTime`,
//! `enabled`), forwards everything else to the service's invoker, and turns
//! lifecycle events into sequenced [`Notification`]s for its subscribers.
pub mod bridge;
pub mod shadow;

pub use bridge::ManagementBridge;
pub use shadow::{KERNEL_ATTRIBUTES, Notification, NotificationListener, ServiceShadow, SubscriptionId};

// Test module declaration
#[cfg(test)]
mod tests;
