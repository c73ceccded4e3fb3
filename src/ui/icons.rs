//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[STOP]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Content kinds
pub static SERVICE: Emoji<'_, '_> = Emoji("🛠️  ", "[S]");
pub static LOCATION: Emoji<'_, '_> = Emoji("📍 ", "[L]");
pub static BLOG: Emoji<'_, '_> = Emoji("📝 ", "[B]");
