//! [`Namelist`] → namelist text.

use super::Namelist;

/// Render a namelist in the layout the model's own tools produce.
pub(super) fn to_namelist_string(nml: &Namelist) -> String {
    let mut out = String::new();
    for group in nml.groups() {
        out.push('&');
        out.push_str(group.name());
        out.push('\n');

        let width = group.entries().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, values) in group.entries() {
            let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            out.push_str(&format!(" {key:<width$} = {},\n", rendered.join(", ")));
        }

        out.push_str("/\n\n");
    }
    out
}
