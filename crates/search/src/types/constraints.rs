//! The search constraint tree.
//!
//! A search is a boolean tree of [`ConstraintNode`]s. Leaves carry an
//! indivisible conjunction of predicates (folders, tags, types, ranges, id
//! sets); intersections and unions combine their children with `AND` and `OR`.
//!
//! Trees are built by the query parser through the `add_*` builders on
//! [`Leaf`] and [`ConstraintNode::and`] / [`ConstraintNode::or`]. The builders
//! detect contradictions early (a tag both required and excluded, two
//! different conversations) and mark the leaf as `no_results`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{SearchError, SearchResult};

use super::item::{FolderRef, ItemType, TagRef};
use super::sort::SortKey;

/// Default cap on optimizer passes.
pub const DEFAULT_MAX_OPTIMIZE_PASSES: usize = 16;

/// The field a range constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RangeKind {
    ItemId,
    /// Received date, bounds in milliseconds.
    Date,
    /// Change date, bounds in milliseconds.
    MDate,
    ModSeq,
    Size,
    /// Calendar start, bounds in milliseconds since the epoch.
    CalStart,
    /// Calendar end, bounds in milliseconds since the epoch.
    CalEnd,
    Sender,
    Subject,
}

impl RangeKind {
    /// Smallest bound value that still constrains the field.
    ///
    /// Bounds below the cutoff are sentinels for "open".
    pub fn cutoff(self) -> i64 {
        match self {
            RangeKind::Size => 0,
            _ => 1,
        }
    }

    /// Ranges that can only be evaluated against the appointment table.
    pub fn is_calendar(self) -> bool {
        matches!(self, RangeKind::CalStart | RangeKind::CalEnd)
    }

    pub fn is_string(self) -> bool {
        matches!(self, RangeKind::Sender | RangeKind::Subject)
    }
}

/// A numeric interval. `positive == false` negates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
    pub positive: bool,
}

impl NumericRange {
    pub fn new(
        min: Option<i64>,
        min_inclusive: bool,
        max: Option<i64>,
        max_inclusive: bool,
        positive: bool,
    ) -> Self {
        Self {
            min,
            max,
            min_inclusive,
            max_inclusive,
            positive,
        }
    }

    /// `[min, max]`, both bounds inclusive.
    pub fn between(min: i64, max: i64) -> Self {
        Self::new(Some(min), true, Some(max), true, true)
    }

    /// Returns the same interval with the opposite polarity.
    pub fn negate(mut self) -> Self {
        self.positive = !self.positive;
        self
    }
}

/// A lexicographic string interval. `positive == false` negates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRange {
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
    pub positive: bool,
}

impl StringRange {
    pub fn new(
        min: Option<String>,
        min_inclusive: bool,
        max: Option<String>,
        max_inclusive: bool,
        positive: bool,
    ) -> Self {
        Self {
            min,
            max,
            min_inclusive,
            max_inclusive,
            positive,
        }
    }
}

/// A range value of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    Numeric(NumericRange),
    String(StringRange),
}

/// A keyset-pagination boundary on the active sort column.
///
/// Bounds are compared against the sort column expression, so string sorts
/// take the folded `sortcol` value of the boundary row and numeric sorts take
/// the raw column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRange {
    pub sort_key: SortKey,
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl CursorRange {
    pub fn new(
        sort_key: SortKey,
        min: Option<String>,
        min_inclusive: bool,
        max: Option<String>,
        max_inclusive: bool,
    ) -> Self {
        Self {
            sort_key,
            min,
            max,
            min_inclusive,
            max_inclusive,
        }
    }
}

/// An indivisible conjunction of search predicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Leaf {
    pub folders: BTreeSet<FolderRef>,
    pub exclude_folders: BTreeSet<FolderRef>,
    pub types: BTreeSet<ItemType>,
    pub exclude_types: BTreeSet<ItemType>,
    pub tags: BTreeSet<TagRef>,
    pub exclude_tags: BTreeSet<TagRef>,
    pub item_ids: BTreeSet<i32>,
    pub prohibited_item_ids: BTreeSet<i32>,
    pub conv_id: Option<i32>,
    pub prohibited_conv_ids: BTreeSet<i32>,
    pub index_ids: BTreeSet<i32>,
    pub ranges: BTreeMap<RangeKind, Vec<Range>>,
    pub cursor_range: Option<CursorRange>,
    pub exclude_has_recipients: bool,
    pub is_solo_part: Option<bool>,
    pub has_index_id: Option<bool>,
    pub no_results: bool,
    /// The type restriction lives on an enclosing intersection, so an empty
    /// `types` set must not fall back to the default type exclusion.
    pub types_factored_out: bool,
}

impl Leaf {
    pub fn new() -> Self {
        Self::default()
    }

    /// A leaf that matches nothing.
    pub fn no_results() -> Self {
        Self {
            no_results: true,
            ..Self::default()
        }
    }

    /// A leaf restricted to the given types.
    pub fn with_types(types: impl IntoIterator<Item = ItemType>) -> Self {
        let mut leaf = Self::default();
        leaf.set_types(types);
        leaf
    }

    /// Returns true if the leaf contributes no predicate at all.
    ///
    /// A leaf with an empty `types` set still excludes non-searchable types,
    /// so it only counts as empty once its types were factored out.
    pub fn is_empty(&self) -> bool {
        !self.no_results
            && self.types_factored_out
            && self.types.is_empty()
            && self.has_only_type_and_folder_fields()
            && self.folders.is_empty()
    }

    fn has_only_type_and_folder_fields(&self) -> bool {
        self.exclude_folders.is_empty()
            && self.exclude_types.is_empty()
            && self.tags.is_empty()
            && self.exclude_tags.is_empty()
            && self.item_ids.is_empty()
            && self.prohibited_item_ids.is_empty()
            && self.conv_id.is_none()
            && self.prohibited_conv_ids.is_empty()
            && self.index_ids.is_empty()
            && self.ranges.is_empty()
            && self.cursor_range.is_none()
            && !self.exclude_has_recipients
            && self.is_solo_part.is_none()
            && self.has_index_id.is_none()
    }

    /// Returns true for a factored-out leaf that only names folders.
    pub(crate) fn is_folder_only(&self) -> bool {
        !self.no_results
            && !self.folders.is_empty()
            && self.types.is_empty()
            && self.types_factored_out
            && self.has_only_type_and_folder_fields()
    }

    /// The types this leaf can match once exclusions are applied.
    ///
    /// An empty result means "unrestricted" when no exclusions are present.
    pub fn computed_types(&self) -> BTreeSet<ItemType> {
        if self.exclude_types.is_empty() {
            return self.types.clone();
        }
        let base: BTreeSet<ItemType> = if self.types.is_empty() {
            ItemType::KNOWN.into_iter().collect()
        } else {
            self.types.clone()
        };
        base.difference(&self.exclude_types).copied().collect()
    }

    /// Returns true if some matching type lives outside the appointment table.
    pub fn has_non_appointment_types(&self) -> bool {
        self.computed_types()
            .iter()
            .any(|t| !t.is_appointment_table_type())
    }

    /// Returns true if evaluating this leaf needs the appointment table.
    pub fn has_appointment_table_constraints(&self) -> bool {
        let has_calendar_range = self.ranges.keys().any(|kind| kind.is_calendar());
        has_calendar_range
            && self
                .computed_types()
                .iter()
                .any(|t| t.is_appointment_table_type())
    }

    /// The single folder of a plain one-folder message listing.
    pub fn only_folder(&self) -> Option<&FolderRef> {
        let plain = self.folders.len() == 1
            && self.exclude_folders.is_empty()
            && self.index_ids.is_empty()
            && self.ranges.is_empty()
            && self.types.contains(&ItemType::Message)
            && !self.exclude_types.contains(&ItemType::Message)
            && self.tags.is_empty()
            && self.exclude_tags.is_empty()
            && self.conv_id.is_none()
            && self.prohibited_conv_ids.is_empty()
            && self.item_ids.is_empty()
            && self.prohibited_item_ids.is_empty();
        if plain {
            self.folders.iter().next()
        } else {
            None
        }
    }

    /// Replaces the type restriction. An empty set matches nothing.
    pub fn set_types(&mut self, types: impl IntoIterator<Item = ItemType>) {
        self.types = types.into_iter().collect();
        if self.types.is_empty() {
            self.no_results = true;
        }
    }

    pub fn add_type(&mut self, item_type: ItemType, include: bool) {
        if include {
            self.types.insert(item_type);
        } else {
            self.exclude_types.insert(item_type);
        }
    }

    /// Requires (or excludes) a folder.
    pub fn add_in_folder(&mut self, folder: FolderRef, include: bool) {
        if include {
            if (!self.folders.is_empty() && !self.folders.contains(&folder))
                || self.exclude_folders.contains(&folder)
            {
                debug!(folder_id = folder.id, "AND of conflicting folders, no-results leaf");
                self.no_results = true;
            }
            self.folders.clear();
            self.folders.insert(folder);
        } else {
            if self.folders.remove(&folder) && self.folders.is_empty() {
                debug!(folder_id = folder.id, "AND of conflicting folders, no-results leaf");
                self.no_results = true;
            }
            self.exclude_folders.insert(folder);
        }
    }

    /// Requires (or excludes) a tag or flag.
    pub fn add_tag(&mut self, tag: TagRef, include: bool) {
        if include {
            if self.exclude_tags.contains(&tag) {
                debug!(tag_id = tag.id, "tag both required and excluded, no-results leaf");
                self.no_results = true;
            }
            self.tags.insert(tag);
        } else {
            if self.tags.contains(&tag) {
                debug!(tag_id = tag.id, "tag both required and excluded, no-results leaf");
                self.no_results = true;
            }
            self.exclude_tags.insert(tag);
        }
    }

    /// Requires (or prohibits) a conversation.
    pub fn add_conv_id(&mut self, conv_id: i32, include: bool) {
        if include {
            if self.prohibited_conv_ids.contains(&conv_id) {
                self.no_results = true;
            }
            match self.conv_id {
                None => self.conv_id = Some(conv_id),
                Some(existing) if existing == conv_id => {}
                Some(_) => {
                    debug!(conv_id, "two conflicting conversation ids, no-results leaf");
                    self.no_results = true;
                }
            }
        } else {
            if self.conv_id == Some(conv_id) {
                self.no_results = true;
            }
            self.prohibited_conv_ids.insert(conv_id);
        }
    }

    /// Requires (or prohibits) an item id.
    pub fn add_item_id(&mut self, item_id: i32, include: bool) {
        if include {
            if !self.prohibited_item_ids.contains(&item_id) {
                self.item_ids.insert(item_id);
            }
        } else {
            self.item_ids.remove(&item_id);
            self.prohibited_item_ids.insert(item_id);
        }
    }

    pub fn add_index_id(&mut self, index_id: i32) {
        self.index_ids.insert(index_id);
    }

    fn add_numeric_range(&mut self, kind: RangeKind, range: NumericRange) {
        self.ranges
            .entry(kind)
            .or_default()
            .push(Range::Numeric(range));
    }

    fn add_string_range(&mut self, kind: RangeKind, range: StringRange) {
        self.ranges
            .entry(kind)
            .or_default()
            .push(Range::String(range));
    }

    /// Received-date range in milliseconds.
    pub fn add_date_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::Date, range);
    }

    /// Change-date range in milliseconds.
    pub fn add_mdate_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::MDate, range);
    }

    pub fn add_cal_start_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::CalStart, range);
    }

    pub fn add_cal_end_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::CalEnd, range);
    }

    pub fn add_modseq_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::ModSeq, range);
    }

    pub fn add_size_range(&mut self, range: NumericRange) {
        self.add_numeric_range(RangeKind::Size, range);
    }

    /// Item-id range; a range with both bounds negative is ignored.
    pub fn add_item_id_range(&mut self, range: NumericRange) {
        let negative = |bound: Option<i64>| bound.is_none_or(|v| v < 0);
        if negative(range.min) && negative(range.max) {
            return;
        }
        self.add_numeric_range(RangeKind::ItemId, range);
    }

    pub fn add_sender_range(&mut self, range: StringRange) {
        self.add_string_range(RangeKind::Sender, range);
    }

    pub fn add_subject_range(&mut self, range: StringRange) {
        self.add_string_range(RangeKind::Subject, range);
    }

    /// Intersects another leaf into this one.
    ///
    /// Inclusion sets are intersected (an empty intersection of two
    /// non-empty sets means no results), exclusion sets and ranges are
    /// unioned.
    pub fn and(&mut self, other: &Leaf) {
        if self.no_results || other.no_results {
            self.no_results = true;
            return;
        }
        self.tags.extend(other.tags.iter().cloned());
        self.exclude_tags.extend(other.exclude_tags.iter().cloned());
        if !self.tags.is_disjoint(&self.exclude_tags) {
            debug!("AND of conflicting tags, no-results leaf");
            self.no_results = true;
            return;
        }

        self.no_results |= intersect_into(&mut self.folders, &other.folders);
        self.exclude_folders
            .extend(other.exclude_folders.iter().cloned());

        if let Some(other_conv) = other.conv_id {
            match self.conv_id {
                Some(conv) if conv != other_conv => {
                    debug!(conv, other_conv, "AND of conflicting conversation ids, no-results leaf");
                    self.no_results = true;
                }
                _ => self.conv_id = Some(other_conv),
            }
        }
        self.prohibited_conv_ids
            .extend(other.prohibited_conv_ids.iter().copied());

        self.no_results |= intersect_into(&mut self.item_ids, &other.item_ids);
        self.prohibited_item_ids
            .extend(other.prohibited_item_ids.iter().copied());
        self.no_results |= intersect_into(&mut self.index_ids, &other.index_ids);

        match (self.has_index_id, other.has_index_id) {
            (None, theirs) => self.has_index_id = theirs,
            (Some(ours), Some(theirs)) if ours != theirs => {
                debug!("AND of has-index-id and has-no-index-id, no-results leaf");
                self.no_results = true;
                return;
            }
            _ => {}
        }
        match (self.is_solo_part, other.is_solo_part) {
            (None, theirs) => self.is_solo_part = theirs,
            (Some(ours), Some(theirs)) if ours != theirs => self.no_results = true,
            _ => {}
        }

        self.no_results |= intersect_into(&mut self.types, &other.types);
        self.exclude_types.extend(other.exclude_types.iter().copied());
        for (kind, ranges) in &other.ranges {
            self.ranges
                .entry(*kind)
                .or_default()
                .extend(ranges.iter().cloned());
        }
        self.exclude_has_recipients |= other.exclude_has_recipients;
        if self.cursor_range.is_none() {
            self.cursor_range = other.cursor_range.clone();
        }
    }

    /// Rejects leaves whose fields contradict each other.
    pub fn validate(&self) -> SearchResult<()> {
        if self.is_solo_part == Some(true) && self.conv_id.is_some() {
            return Err(SearchError::invalid(
                "a solo-part constraint cannot also name a conversation",
            ));
        }
        if self.has_index_id == Some(false) && !self.index_ids.is_empty() {
            return Err(SearchError::invalid(
                "index ids given for items required to have no index id",
            ));
        }
        if let Some(cursor) = &self.cursor_range
            && !cursor.sort_key.has_sort_column()
        {
            return Err(SearchError::invalid(format!(
                "cursor range on {:?}, which has no sort column",
                cursor.sort_key
            )));
        }
        for (kind, ranges) in &self.ranges {
            for range in ranges {
                let matches_kind = match range {
                    Range::Numeric(_) => !kind.is_string(),
                    Range::String(_) => kind.is_string(),
                };
                if !matches_kind {
                    return Err(SearchError::invalid(format!(
                        "{kind:?} range has the wrong value kind"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Intersects `theirs` into `ours` when `theirs` is non-empty.
///
/// Returns true if two non-empty sets had nothing in common.
fn intersect_into<T: Ord + Clone>(ours: &mut BTreeSet<T>, theirs: &BTreeSet<T>) -> bool {
    if theirs.is_empty() {
        return false;
    }
    if ours.is_empty() {
        ours.extend(theirs.iter().cloned());
        return false;
    }
    ours.retain(|v| theirs.contains(v));
    ours.is_empty()
}

/// A node of the constraint tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintNode {
    Leaf(Leaf),
    Intersection(Vec<ConstraintNode>),
    Union(Vec<ConstraintNode>),
}

impl From<Leaf> for ConstraintNode {
    fn from(leaf: Leaf) -> Self {
        ConstraintNode::Leaf(leaf)
    }
}

impl ConstraintNode {
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            ConstraintNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Children of an intersection or union; empty for a leaf.
    pub fn children(&self) -> &[ConstraintNode] {
        match self {
            ConstraintNode::Leaf(_) => &[],
            ConstraintNode::Intersection(children) | ConstraintNode::Union(children) => children,
        }
    }

    /// Returns true if the node contributes no predicate.
    pub fn is_empty(&self) -> bool {
        match self {
            ConstraintNode::Leaf(leaf) => leaf.is_empty(),
            ConstraintNode::Intersection(children) | ConstraintNode::Union(children) => {
                children.iter().all(ConstraintNode::is_empty)
            }
        }
    }

    fn is_no_results_leaf(&self) -> bool {
        matches!(self, ConstraintNode::Leaf(leaf) if leaf.no_results)
    }

    /// `self AND other`, merging leaves where possible.
    pub fn and(self, other: ConstraintNode) -> ConstraintNode {
        use ConstraintNode::*;
        match (self, other) {
            (Leaf(mut ours), Leaf(theirs)) => {
                ours.and(&theirs);
                Leaf(ours)
            }
            (Intersection(mut children), Leaf(theirs))
            | (Leaf(theirs), Intersection(mut children)) => {
                merge_into_leaf_child(&mut children, &theirs);
                Intersection(children)
            }
            (Intersection(mut children), Intersection(theirs)) => {
                for child in theirs {
                    match child {
                        Leaf(leaf) => merge_into_leaf_child(&mut children, &leaf),
                        other => children.push(other),
                    }
                }
                Intersection(children)
            }
            (Intersection(mut children), union @ Union(_))
            | (union @ Union(_), Intersection(mut children)) => {
                children.push(union);
                Intersection(children)
            }
            (ours, theirs) => Intersection(vec![ours, theirs]),
        }
    }

    /// `self OR other`, flattening nested unions.
    pub fn or(self, other: ConstraintNode) -> ConstraintNode {
        use ConstraintNode::*;
        match (self, other) {
            (Union(mut children), Union(theirs)) => {
                children.extend(theirs);
                Union(children)
            }
            (Union(mut children), other) => {
                children.push(other);
                Union(children)
            }
            (ours, theirs) => Union(vec![ours, theirs]),
        }
    }

    /// Validates every leaf of the tree.
    pub fn validate(&self) -> SearchResult<()> {
        match self {
            ConstraintNode::Leaf(leaf) => leaf.validate(),
            _ => self.children().iter().try_for_each(ConstraintNode::validate),
        }
    }

    /// Returns true if some leaf needs the appointment table.
    pub fn has_appointment_table_constraints(&self) -> bool {
        match self {
            ConstraintNode::Leaf(leaf) => leaf.has_appointment_table_constraints(),
            _ => self
                .children()
                .iter()
                .any(ConstraintNode::has_appointment_table_constraints),
        }
    }

    /// Returns true if some leaf can match rows outside the appointment table.
    pub fn has_non_appointment_types(&self) -> bool {
        match self {
            ConstraintNode::Leaf(leaf) => leaf.has_non_appointment_types(),
            _ => self
                .children()
                .iter()
                .any(ConstraintNode::has_non_appointment_types),
        }
    }

    /// The first leaf (depth first) that includes the given folder.
    pub fn find_leaf_with_folder(&self, folder_id: i32) -> Option<&Leaf> {
        match self {
            ConstraintNode::Leaf(leaf) => leaf
                .folders
                .iter()
                .any(|f| f.id == folder_id)
                .then_some(leaf),
            _ => self
                .children()
                .iter()
                .find_map(|child| child.find_leaf_with_folder(folder_id)),
        }
    }

    /// Simplifies the tree without changing what it matches.
    ///
    /// Passes run until the tree stops changing, so the result is a fixpoint
    /// and `n.optimize().optimize() == n.optimize()`.
    pub fn optimize(&self) -> ConstraintNode {
        self.optimize_bounded(DEFAULT_MAX_OPTIMIZE_PASSES)
    }

    /// [`optimize`](Self::optimize) with an explicit pass limit.
    pub fn optimize_bounded(&self, max_passes: usize) -> ConstraintNode {
        let mut current = self.clone();
        for _ in 0..max_passes {
            let next = current.optimize_pass();
            if next == current {
                return next;
            }
            current = next;
        }
        warn!(max_passes, "constraint optimizer stopped before reaching a fixpoint");
        current
    }

    fn optimize_pass(&self) -> ConstraintNode {
        match self {
            ConstraintNode::Leaf(leaf) => ConstraintNode::Leaf(leaf.clone()),
            ConstraintNode::Intersection(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    match child.optimize_pass() {
                        c if c.is_empty() => {}
                        ConstraintNode::Intersection(grandchildren) => flat.extend(grandchildren),
                        c => flat.push(c),
                    }
                }
                if let Some(pos) = flat.iter().position(ConstraintNode::is_no_results_leaf) {
                    return flat.swap_remove(pos);
                }
                collapse(ConstraintNode::Intersection, flat)
            }
            ConstraintNode::Union(children) => {
                let mut flat = Vec::with_capacity(children.len());
                let mut dropped = None;
                for child in children {
                    match child.optimize_pass() {
                        // An always-true arm makes the union always true.
                        c if c.is_empty() => return ConstraintNode::Intersection(Vec::new()),
                        c if c.is_no_results_leaf() => {
                            dropped.get_or_insert(c);
                        }
                        ConstraintNode::Union(grandchildren) => flat.extend(grandchildren),
                        c => flat.push(c),
                    }
                }
                if flat.is_empty()
                    && let Some(no_results) = dropped
                {
                    return no_results;
                }
                collapse(ConstraintNode::Union, factor_common_types(flat))
            }
        }
    }
}

fn merge_into_leaf_child(children: &mut Vec<ConstraintNode>, leaf: &Leaf) {
    for child in children.iter_mut() {
        if let ConstraintNode::Leaf(existing) = child {
            existing.and(leaf);
            return;
        }
    }
    children.push(ConstraintNode::Leaf(leaf.clone()));
}

fn collapse(
    make: fn(Vec<ConstraintNode>) -> ConstraintNode,
    mut children: Vec<ConstraintNode>,
) -> ConstraintNode {
    if children.len() == 1 {
        children.remove(0)
    } else {
        make(children)
    }
}

/// Factors a type set shared by more than two leaves of a union out into an
/// enclosing intersection:
///
/// `(T AND a) OR (T AND b) OR (T AND c)` becomes `T AND (a OR b OR c)`.
fn factor_common_types(children: Vec<ConstraintNode>) -> Vec<ConstraintNode> {
    let mut groups: Vec<(BTreeSet<ItemType>, Vec<usize>)> = Vec::new();
    for (idx, child) in children.iter().enumerate() {
        if let ConstraintNode::Leaf(leaf) = child
            && !leaf.types.is_empty()
        {
            match groups.iter_mut().find(|(types, _)| *types == leaf.types) {
                Some((_, members)) => members.push(idx),
                None => groups.push((leaf.types.clone(), vec![idx])),
            }
        }
    }
    groups.retain(|(_, members)| members.len() > 2);
    if groups.is_empty() {
        return children;
    }

    let mut slots: Vec<Option<ConstraintNode>> = children.into_iter().map(Some).collect();
    let mut replacements: BTreeMap<usize, ConstraintNode> = BTreeMap::new();
    for (types, members) in groups {
        let mut factored = Vec::with_capacity(members.len());
        for &idx in &members {
            if let Some(ConstraintNode::Leaf(mut leaf)) = slots[idx].take() {
                leaf.types.clear();
                leaf.types_factored_out = true;
                factored.push(leaf);
            }
        }
        let inner = collapse(ConstraintNode::Union, combine_folder_leaves(factored));
        replacements.insert(
            members[0],
            ConstraintNode::Intersection(vec![ConstraintNode::Leaf(Leaf::with_types(types)), inner]),
        );
    }

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(idx, slot)| replacements.remove(&idx).or(slot))
        .collect()
}

/// Merges leaves that only name folders into one leaf, so
/// `folder = ? OR folder = ? OR ...` becomes `folder IN (?, ?, ...)`.
fn combine_folder_leaves(leaves: Vec<Leaf>) -> Vec<ConstraintNode> {
    let (folder_only, others): (Vec<Leaf>, Vec<Leaf>) =
        leaves.into_iter().partition(Leaf::is_folder_only);
    if folder_only.len() < 2 {
        return folder_only
            .into_iter()
            .chain(others)
            .map(ConstraintNode::Leaf)
            .collect();
    }

    let mut combined = Leaf {
        types_factored_out: true,
        ..Leaf::default()
    };
    for leaf in folder_only {
        combined.folders.extend(leaf.folders);
    }
    std::iter::once(combined)
        .chain(others)
        .map(ConstraintNode::Leaf)
        .collect()
}
