/*!

This is the long-form manual for `nominee_scoring` and `nomscore`.

## Overview

Reviewers write one free-form summary per nominee and per attribute. `nomscore` sends all
the summaries for one attribute to a language model in a single request, asks it for a
comparative score and a justification for each nominee, and then computes weighted totals.

The evaluation has three levels:

| level     | computation                                               |
|-----------|-----------------------------------------------------------|
| attribute | score returned by the model, times the category weight   |
| category  | sum of the attribute scores, times the category weight    |
| total     | sum of the weighted category scores                       |

All the weighted values are rounded to 2 decimals.

## Input format

The input is an Excel (.xlsx) file. The first row is a header, which must contain the
columns `Nominee`, `Attribute` and `Summary` (in any order, other columns are ignored):

| Nominee | Attribute | Summary                                   |
|---------|-----------|-------------------------------------------|
| Alice   | Delegates | Alice hands over the weekly planning ...  |
| Bob     | Delegates | Bob keeps most of the decisions ...       |

Rows with an attribute that is not part of the criteria are ignored.

## Output format

The output is an Excel file with three worksheets:

- `Attribute Scores`: one row per nominee and attribute returned by the model
- `Category Scores`: one row per nominee and category that received at least one score
- `Summary`: one row per nominee, with the total weighted score

If the model answer for an attribute cannot be understood, a warning is printed and the
nominees simply get no score for this attribute. The other attributes are not affected.

## Configuration file

All the options can be provided in a JSON file passed with `--config`. Relative paths
are resolved from the directory of the configuration file.

```json
{
  "inputSource": {
    "filePath": "reviews.xlsx",
    "excelWorksheetName": "Sheet1"
  },
  "outputSettings": {
    "outputPath": "outputs/scores.xlsx",
    "jsonOutputPath": "outputs/scores.json",
    "runName": "2024 nominations"
  },
  "criteria": [
    {
      "category": "Business Performance",
      "weight": 0.333,
      "attributes": [
        { "name": "Delegates", "maxScore": 2.5 },
        { "name": "Personal Impact", "maxScore": 2.5 }
      ]
    }
  ],
  "model": {
    "name": "gpt-4o",
    "temperature": 0.2,
    "maxTokens": 1500
  },
  "rules": {
    "roundingMode": "halfAwayFromZero"
  }
}
```

When `criteria` is not provided, the builtin criteria are used (see [`crate::Registry::builtin`]).

### Rounding

`roundingMode` is either `halfAwayFromZero` (the default, 0.125 becomes 0.13) or
`halfEven` (0.125 becomes 0.12).

### Scores out of range

The model is asked for scores between 1 and the maximum score of the attribute. Scores
outside of this range are kept as they are, and a warning is printed.

## JSON summary

With `--json-out` (a path, or `stdout`), a summary of the run is also written as JSON. It
has the keys `config` (run name, model, rounding mode), `attributes` (for each attribute:
the number of reviews, the number of scores returned and whether the answer could be
parsed), `attributeScores`, `categoryScores`, `summary` and `ranking`. It does not contain
any file path.

A previous summary can be passed with `--reference`: the run fails and prints the
differences if the new summary is not identical.

## Offline runs

The answers of the model can be provided in a JSON file with `--responses`, one entry per
attribute. No API key is needed in this case:

```json
{
  "Delegates": "[{\"Nominee\": \"Alice\", \"Score\": 2.0, \"Justification\": \"...\"}]"
}
```

*/
