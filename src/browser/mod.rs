//! Active browser tab lookup for the capture loop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chromium,
    Safari,
    Arc,
}

/// Process-name fragments recognized as browsers, matched case-insensitively.
pub const SUPPORTED_BROWSERS: &[(&str, BrowserKind)] = &[
    ("Google Chrome", BrowserKind::Chromium),
    ("Chrome", BrowserKind::Chromium),
    ("Safari", BrowserKind::Safari),
    ("Brave Browser", BrowserKind::Chromium),
    ("Arc", BrowserKind::Arc),
    ("Microsoft Edge", BrowserKind::Chromium),
];

pub fn browser_kind(process_name: &str) -> Option<BrowserKind> {
    let lowered = process_name.to_lowercase();
    SUPPORTED_BROWSERS
        .iter()
        .find(|(name, _)| lowered.contains(&name.to_lowercase()))
        .map(|(_, kind)| *kind)
}

/// Resolves the foreground tab of a recognized browser.
///
/// Implementations never fail the caller: anything unavailable is `None`.
pub trait BrowserTabResolver: Send {
    fn is_browser(&self, process_name: &str) -> bool {
        browser_kind(process_name).is_some()
    }

    fn active_tab(&self, process_name: &str) -> Option<BrowserTab>;
}

/// Scripting-bridge resolver; only macOS exposes tab state this way.
#[derive(Debug, Default)]
pub struct NativeBrowserResolver;

impl BrowserTabResolver for NativeBrowserResolver {
    #[cfg(target_os = "macos")]
    fn active_tab(&self, process_name: &str) -> Option<BrowserTab> {
        let kind = browser_kind(process_name)?;
        let output = crate::platform::macos::run_osascript(&tab_script(kind, process_name))?;
        parse_tab_output(&output)
    }

    #[cfg(not(target_os = "macos"))]
    fn active_tab(&self, _process_name: &str) -> Option<BrowserTab> {
        None
    }
}

#[cfg_attr(
    not(target_os = "macos"),
    allow(dead_code, reason = "only the macOS resolver scripts browsers")
)]
fn tab_script(kind: BrowserKind, process_name: &str) -> String {
    let (app, tab_ref, title_prop) = match kind {
        BrowserKind::Chromium => (process_name, "active tab", "title"),
        BrowserKind::Safari => ("Safari", "current tab", "name"),
        BrowserKind::Arc => ("Arc", "active tab", "title"),
    };
    let app = app.replace('"', "");
    format!(
        r#"tell application "{app}"
    if (count of windows) > 0 then
        set currentTab to {tab_ref} of front window
        return (URL of currentTab) & "|||" & ({title_prop} of currentTab)
    end if
end tell"#
    )
}

#[cfg_attr(
    not(target_os = "macos"),
    allow(dead_code, reason = "only the macOS resolver scripts browsers")
)]
fn parse_tab_output(output: &str) -> Option<BrowserTab> {
    let mut parts = output.trim().splitn(2, "|||");
    let url = parts.next().map(str::trim).filter(|u| !u.is_empty())?;
    let title = parts
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Some(BrowserTab {
        url: url.to_string(),
        title,
    })
}
