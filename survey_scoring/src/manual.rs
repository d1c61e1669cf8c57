/*!

This is the long-form manual for `survey_scoring` and `survey-report`.

## Reading answers

Every cell of a section goes through the same steps:

1. empty cells are *missing*: they do not count, and are not reported.
2. the text is trimmed, put in lowercase, stripped of its accents and its
   internal spaces are collapsed: `" Totalménte  DE acuerdo"` becomes
   `"totalmente de acuerdo"`.
3. a single digit (`"3"`) is read as is.
4. a digit followed by a separator and a label (`"5 - Excelente"`,
   `"4) Muy bueno"`) is read as the digit.
5. otherwise the text is looked up in the answer dictionary.
6. anything else is *unknown*: it does not count, and it is added to the audit log.

Scores outside of the range of the form (`0-5` or `1-5`) are unknown as well.
Numbers stored as such in the spreadsheet are accepted when they are whole and
within range.

## Answer dictionary

The dictionary is the union of five families, merged in this order:

| Family | Answers |
|----------------|---------|
| Recommendation | `si` 5, `definitivamente si` 5, `probablemente si` 4, `tal vez` 3, `no estoy seguro` 3, `probablemente no` 2, `definitivamente no` 1, `no` 1 |
| Agreement      | `totalmente de acuerdo` 5, `muy de acuerdo` 5, `de acuerdo` 4, `ni de acuerdo ni en desacuerdo` 3, `neutral` 3, `en desacuerdo` 2, `muy en desacuerdo` 1, `totalmente en desacuerdo` 1 |
| Satisfaction   | `muy satisfecho` 5, `totalmente satisfecho` 5, `satisfecho` 4, `ni satisfecho ni insatisfecho` 3, `neutral` 3, `poco satisfecho` 2, `insatisfecho` 2, `nada satisfecho` 1, `muy insatisfecho` 1 |
| Performance    | `excelente` 5, `muy bueno` 4, `bueno` 4, `regular` 3, `malo` 2, `deficiente` 1, `muy malo` 1, `pesimo` 1 |
| Frequency      | `siempre` 5, `casi siempre` 4, `frecuentemente` 4, `algunas veces` 3, `a veces` 3, `ocasionalmente` 3, `casi nunca` 2, `rara vez` 2, `nunca` 1, `no lo utilizo` 0, `no lo uso` 0 |

When two families define the same answer, the first one in the table keeps
it. The collisions are available from `ScaleDictionary::collisions`.

## Sections

A section is a range of columns given with spreadsheet letters, for instance
`C` to `G`. The letters may be given in any order, and the range is cut to the
width of the table: a section that falls entirely outside of a (shortened) form
has no data.

The mean of a section is the mean of all its valid cells, all rows and all
columns together. A section without any valid cell has no mean: this is
reported as "no data", which is different from a mean of 0.

The mean of a table weighs each section by its number of valid cells. The
institution-wide mean weighs each section by its number of respondents.

## Scopes

* `institutional`: all the responses.
* `academicDirection`: all the responses, or those of one program if requested.
* `director`: only the responses of the director's program. If the form has no
  program column, nothing is shown.

Dates restrict the responses to one or several windows, the end date being
included. The windows can be given directly, or come from the applications
sheet (`aplicacion_id`, `descripcion`, `formulario`, `fecha_inicio`,
`fecha_fin`).

## Configuration file

The `survey-report` program reads a JSON file:

```json
{
  "outputSettings": { "reportName": "Encuesta de calidad 2025", "decimalPlaces": 4 },
  "sources": [
    {
      "modality": "virtual",
      "provider": "xlsx",
      "filePath": "respuestas.xlsx",
      "excelWorksheetName": "servicios virtual y mixto virtual",
      "timestampColumn": "Marca temporal",
      "programColumn": "Carrera de procedencia",
      "form": "servicios virtual y mixto virtual"
    }
  ],
  "scope": { "view": "director", "program": "Derecho" }
}
```

When no `modalities` are given, the sections of the `virtual`, `escolar` and
`prepa` forms are used. A modality can declare a `schemaVersion` and a
`minColumns` (a number or a column letter): a table narrower than that stops
the report with an error instead of silently producing empty sections.

*/
