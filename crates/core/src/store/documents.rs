//! [`Document`] bindings for every stored entity.

use super::{AnyDocument, Collection, Document, Table, Tables};
use crate::models::{LabResult, LabTest, Order, Patient, Report, Sample, User};
use lis_uuid::EntityId;

/// Unique index names. Also used as the `index` of a `Conflict` error.
pub const MRN_INDEX: &str = "mrn";
pub const TEST_CODE_INDEX: &str = "test code";
pub const EMAIL_INDEX: &str = "email";
pub const RESULT_PAIR_INDEX: &str = "result for order and test";

impl Document for Patient {
    const COLLECTION: Collection = Collection::Patients;
    const ENTITY: &'static str = "patient";

    fn id(&self) -> EntityId {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(MRN_INDEX, self.mrn.clone())]
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.patients
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.patients
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Patient(self)
    }
}

impl Document for LabTest {
    const COLLECTION: Collection = Collection::Tests;
    const ENTITY: &'static str = "test";

    fn id(&self) -> EntityId {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(TEST_CODE_INDEX, self.code.clone())]
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.tests
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.tests
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Test(self)
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;
    const ENTITY: &'static str = "user";

    fn id(&self) -> EntityId {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(EMAIL_INDEX, self.email.as_str().to_string())]
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.users
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.users
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::User(self)
    }
}

impl Document for Order {
    const COLLECTION: Collection = Collection::Orders;
    const ENTITY: &'static str = "order";

    fn id(&self) -> EntityId {
        self.id
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.orders
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.orders
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Order(self)
    }
}

impl Document for Sample {
    const COLLECTION: Collection = Collection::Samples;
    const ENTITY: &'static str = "sample";

    fn id(&self) -> EntityId {
        self.id
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.samples
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.samples
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Sample(self)
    }
}

impl Document for LabResult {
    const COLLECTION: Collection = Collection::Results;
    const ENTITY: &'static str = "result";

    fn id(&self) -> EntityId {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(RESULT_PAIR_INDEX, LabResult::pair_key(self.order, self.test))]
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.results
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.results
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Result(self)
    }
}

impl Document for Report {
    const COLLECTION: Collection = Collection::Reports;
    const ENTITY: &'static str = "report";

    fn id(&self) -> EntityId {
        self.id
    }

    fn table(tables: &Tables) -> &Table<Self> {
        &tables.reports
    }

    fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
        &mut tables.reports
    }

    fn into_any(self) -> AnyDocument {
        AnyDocument::Report(self)
    }
}
