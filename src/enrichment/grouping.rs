use std::collections::HashMap;

use crate::db::DbPerson;

/// Eligible records sharing one employer domain.
#[derive(Debug, Clone)]
pub struct DomainGroup {
    /// `None` for records with no known domain.
    pub domain: Option<String>,
    pub people: Vec<DbPerson>,
}

/// Group records by `organization_domain`.
///
/// Groups appear in the order their domain is first seen; records keep
/// their relative order inside a group. The no-domain group, if any, is last.
pub fn group_by_domain(people: Vec<DbPerson>) -> Vec<DomainGroup> {
    let mut groups: Vec<DomainGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut no_domain: Vec<DbPerson> = Vec::new();

    for person in people {
        let domain = person
            .organization_domain
            .as_deref()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty());

        match domain {
            Some(domain) => match index.get(&domain) {
                Some(&i) => groups[i].people.push(person),
                None => {
                    index.insert(domain.clone(), groups.len());
                    groups.push(DomainGroup { domain: Some(domain), people: vec![person] });
                }
            },
            None => no_domain.push(person),
        }
    }

    if !no_domain.is_empty() {
        groups.push(DomainGroup { domain: None, people: no_domain });
    }
    groups
}
