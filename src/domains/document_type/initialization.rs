use crate::auth::AuthContext;
use crate::domains::document_type::service::DocumentTypeService;
use crate::domains::document_type::types::NewDocumentType;
use crate::errors::ServiceResult;

/// The standard document types a fresh installation starts with.
pub fn standard_document_types() -> Vec<NewDocumentType> {
    vec![
        NewDocumentType {
            name: "Invoice".to_string(),
            description: Some("Bills and payment requests".to_string()),
        },
        NewDocumentType {
            name: "Contract".to_string(),
            description: Some("Agreements and legal documents".to_string()),
        },
        NewDocumentType {
            name: "Report".to_string(),
            description: Some("Analyses, summaries and findings".to_string()),
        },
        NewDocumentType {
            name: "Receipt".to_string(),
            description: Some("Proof of payment".to_string()),
        },
        NewDocumentType {
            name: "Letter".to_string(),
            description: Some("Correspondence".to_string()),
        },
        NewDocumentType {
            name: "Other".to_string(),
            description: Some("Uncategorized documents".to_string()),
        },
    ]
}

/// Create any standard types missing from the store. Existing names are left
/// untouched, so this is safe to run on every startup.
pub async fn ensure_standard_types(
    service: &dyn DocumentTypeService,
    auth: &AuthContext,
) -> ServiceResult<usize> {
    let mut created = 0;
    let existing = service.list_document_types(Default::default()).await?;
    let existing_names: Vec<&str> = existing.items.iter().map(|t| t.name.as_str()).collect();

    for new_type in standard_document_types() {
        if existing_names.contains(&new_type.name.as_str()) {
            continue;
        }
        service.create_document_type(auth, new_type).await?;
        created += 1;
    }

    if created > 0 {
        log::info!("Seeded {} standard document types", created);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin_context, test_document_type_service};

    #[test]
    fn test_standard_types_have_unique_names() {
        let types = standard_document_types();
        let mut names: Vec<_> = types.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), types.len());
        assert!(names.contains(&"Invoice".to_string()));
        assert!(names.contains(&"Other".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_standard_types_is_idempotent() {
        let service = test_document_type_service().await;
        let auth = admin_context();

        let first = ensure_standard_types(service.as_ref(), &auth).await.unwrap();
        assert_eq!(first, standard_document_types().len());

        let second = ensure_standard_types(service.as_ref(), &auth).await.unwrap();
        assert_eq!(second, 0);
    }
}
