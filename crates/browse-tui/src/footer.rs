//! Shortcut bar shown under each step status line.

use browse_core::ControlFlags;

/// Renders the shortcut bar. Labels describe what pressing the key would do
/// given the current flags.
pub fn shortcut_bar(flags: &ControlFlags) -> String {
    let browser = if flags.browser_visible { "Minimise" } else { "Show" };
    let detail = if flags.verbose { "Less" } else { "More" };
    let vision = if flags.vision_enabled { "Disable" } else { "Enable" };
    let pause = if flags.paused { "Resume" } else { "Pause" };

    format!(
        "[B] {browser} browser  [V] {detail} detail  [F] {vision} vision  [I] Instruct  [P] {pause}  [Q] Quit"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        assert_eq!(
            shortcut_bar(&ControlFlags::default()),
            "[B] Show browser  [V] More detail  [F] Enable vision  [I] Instruct  [P] Pause  [Q] Quit"
        );
    }

    #[test]
    fn test_labels_flip_with_flags() {
        let flags = ControlFlags {
            browser_visible: true,
            verbose: true,
            vision_enabled: true,
            paused: true,
            ..ControlFlags::default()
        };
        assert_eq!(
            shortcut_bar(&flags),
            "[B] Minimise browser  [V] Less detail  [F] Disable vision  [I] Instruct  [P] Resume  [Q] Quit"
        );
    }
}
