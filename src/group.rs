use std::collections::HashMap;

/// Rows sharing one label, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Group {
    pub label: Option<String>,
    pub rows: Vec<usize>,
}

/// Partition row positions by label.
///
/// Groups appear in the order their label is first seen and each group lists
/// its rows in ascending order. With `keep_missing` false, rows with a null
/// label belong to no group.
pub(crate) fn group_rows(labels: &[Option<String>], keep_missing: bool) -> Vec<Group> {
    let mut position: HashMap<Option<&str>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for (row, label) in labels.iter().enumerate() {
        if label.is_none() && !keep_missing {
            continue;
        }
        let slot = *position.entry(label.as_deref()).or_insert_with(|| {
            groups.push(Group {
                label: label.clone(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(row);
    }

    groups
}
