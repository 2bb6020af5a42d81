/*!
# SafeWalk DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement du dashboard SafeWalk avec:
- Backend HTTP stub pour tests sans robot
- Fixtures JSON (documents OSM, hazards, télémétrie)
- Harness de tests d'intégration
*/

pub mod backend_stub;
pub mod fixtures;
pub mod test_utils;

pub use backend_stub::{StubBackend, StubResponse};
pub use fixtures::OsmDocBuilder;
pub use test_utils::{collect_for, wait_for, TestHarness};
