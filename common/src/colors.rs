use owo_colors::Rgb;

/// Coordinator lifecycle: connects/resets/leader transitions.
pub const COORDINATOR: Rgb = Rgb(86, 156, 214);
/// Clustering model: dirty/damper/rollout.
pub const ROLLOUT: Rgb = Rgb(212, 49, 113);
/// Lifecycle executor: child process supervision.
pub const EXECUTOR: Rgb = Rgb(170, 140, 50);
