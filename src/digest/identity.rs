use crate::digest::model::IdentityMap;
use crate::slack::client::{ChatProvider, DirectoryMember};
use std::collections::HashMap;

const MAX_DIRECTORY_PAGES: usize = 500;

fn display_name(member: &DirectoryMember) -> String {
    [member.real_name.as_deref(), member.name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(member.id.as_str())
        .to_string()
}

/// Page through the whole user directory. Failures end the walk early and
/// keep whatever was already resolved; unresolved ids later render raw.
pub fn resolve_all(provider: &dyn ChatProvider, page_limit: u32) -> IdentityMap {
    let mut names = HashMap::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_DIRECTORY_PAGES {
        let page = match provider.list_users(cursor.as_deref(), page_limit) {
            Ok(page) => page,
            Err(err) => {
                let err_text = format!("{err:#}");
                tracing::warn!(
                    resolved = names.len(),
                    error = %err_text,
                    "user directory fetch failed; keeping partial identity map"
                );
                break;
            }
        };
        if !page.ok {
            tracing::warn!(
                resolved = names.len(),
                error = page.error.as_deref().unwrap_or("unknown error"),
                "user directory returned not ok"
            );
            break;
        }
        for member in &page.members {
            names.insert(member.id.clone(), display_name(member));
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    let identities = IdentityMap::new(names);
    if identities.is_empty() {
        tracing::warn!("identity map is empty; authors will render as raw ids");
    } else {
        tracing::info!(users = identities.len(), "identity map resolved");
    }
    identities
}
