//! Storage key layout.
//!
//! `tenants/{tenant}/documents/{document}/v{n}/{file name}`. Every key of
//! a tenant shares the `tenants/{tenant}/` prefix, which the admin
//! storage listing relies on.

use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 200;

pub fn tenant_prefix(tenant_id: Uuid) -> String {
    format!("tenants/{tenant_id}/")
}

pub fn document_prefix(tenant_id: Uuid, document_id: Uuid) -> String {
    format!("{}documents/{document_id}/", tenant_prefix(tenant_id))
}

pub fn document_key(tenant_id: Uuid, document_id: Uuid, version: u32, file_name: &str) -> String {
    format!(
        "{}v{version}/{}",
        document_prefix(tenant_id, document_id),
        sanitize_file_name(file_name)
    )
}

/// Reduce an uploaded file name to `[A-Za-z0-9._-]`, dropping any path
/// components. Never returns an empty string or a dot-only name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.len() > MAX_FILE_NAME_LEN {
        clean = clean.split_off(clean.len() - MAX_FILE_NAME_LEN);
    }
    if clean.chars().all(|c| c == '.') {
        return "file".into();
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let t = Uuid::nil();
        let d = Uuid::nil();
        assert_eq!(
            document_key(t, d, 3, "Q3 report.pdf"),
            format!("tenants/{t}/documents/{d}/v3/Q3_report.pdf")
        );
        assert!(document_key(t, d, 1, "x").starts_with(&tenant_prefix(t)));
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\résumé.docx"), "r_sum_.docx");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn sanitize_keeps_the_extension_of_long_names() {
        let long = format!("{}.pdf", "a".repeat(500));
        let clean = sanitize_file_name(&long);
        assert_eq!(clean.len(), MAX_FILE_NAME_LEN);
        assert!(clean.ends_with(".pdf"));
    }
}
