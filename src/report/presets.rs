// The sections of the three forms in use at the institution.

use survey_scoring::ModalityDefinition;

pub fn virtual_modality() -> ModalityDefinition {
    ModalityDefinition::new("virtual", "Servicios virtual y mixto virtual")
        .schema(1, Some(57))
        .section("Director / Coordinador", "C", "G")
        .section("Aprendizaje", "H", "P")
        .section("Materiales en la plataforma", "Q", "U")
        .section("Evaluación del conocimiento", "V", "Y")
        .section("Acceso a soporte académico", "Z", "AD")
        .section("Acceso a soporte administrativo", "AE", "AI")
        .section("Comunicación con compañeros", "AJ", "AQ")
        .section("Recomendación", "AR", "AU")
        .section("Plataforma SEAC", "AV", "AZ")
        .section("Comunicación con la universidad", "BA", "BE")
}

pub fn escolar_modality() -> ModalityDefinition {
    ModalityDefinition::new("escolar", "Servicios escolarizados y licenciaturas ejecutivas")
        .schema(1, Some(57))
        .section("Servicios administrativos / apoyo", "I", "V")
        .section("Servicios académicos", "W", "AH")
        .section("Director / Coordinador", "AI", "AM")
        .section("Instalaciones y equipo tecnológico", "AN", "AX")
        .section("Ambiente escolar", "AY", "BE")
}

pub fn prepa_modality() -> ModalityDefinition {
    ModalityDefinition::new("prepa", "Preparatoria")
        .schema(1, Some(73))
        .section("Servicios administrativos / apoyo", "H", "Q")
        .section("Servicios académicos", "R", "AC")
        .section("Directores y coordinadores", "AD", "BB")
        .section("Instalaciones y equipo tecnológico", "BC", "BN")
        .section("Ambiente escolar", "BO", "BU")
}

pub fn builtin_modalities() -> Vec<ModalityDefinition> {
    vec![virtual_modality(), escolar_modality(), prepa_modality()]
}

/// The name of the form of a built-in modality, as written in the
/// applications sheet.
pub fn default_form(modality_key: &str) -> Option<&'static str> {
    match modality_key {
        "virtual" => Some("servicios virtual y mixto virtual"),
        "escolar" => Some("servicios escolarizados y licenciaturas ejecutivas"),
        "prepa" => Some("Preparatoria"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_scoring::columns::index_of;

    #[test]
    fn sections_fit_the_forms() {
        for m in builtin_modalities() {
            let min_columns = m.min_columns.unwrap();
            for s in m.sections.iter() {
                let start = index_of(&s.start).unwrap();
                let end = index_of(&s.end).unwrap();
                assert!(start <= end, "{} {}", m.key, s.name);
                assert!(end < min_columns, "{} {}", m.key, s.name);
            }
            assert!(default_form(&m.key).is_some());
        }
        assert_eq!(default_form("posgrado"), None);
    }

    #[test]
    fn sections() {
        assert_eq!(virtual_modality().sections.len(), 10);
        assert_eq!(escolar_modality().sections.len(), 5);
        assert_eq!(prepa_modality().sections[4].end, "BU");
    }
}
